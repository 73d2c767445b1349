//! Session events — the append-only source-of-truth log.
//!
//! Every turn records what happened as an immutable event. The set of event
//! types is closed; anything outside it is rejected before a store write.

use crate::artifact::ArtifactKind;
use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// All event types a session log accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UserMessage,
    RepoDiff,
    Snippet,
    DocChunk,
    ToolOutput,
    AssistantResponse,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::UserMessage,
        EventType::RepoDiff,
        EventType::Snippet,
        EventType::DocChunk,
        EventType::ToolOutput,
        EventType::AssistantResponse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::UserMessage => "user_message",
            EventType::RepoDiff => "repo_diff",
            EventType::Snippet => "snippet",
            EventType::DocChunk => "doc_chunk",
            EventType::ToolOutput => "tool_output",
            EventType::AssistantResponse => "assistant_response",
        }
    }

    /// The artifact kind this event type produces, if any.
    pub fn artifact_kind(&self) -> Option<ArtifactKind> {
        match self {
            EventType::RepoDiff => Some(ArtifactKind::RepoDiff),
            EventType::Snippet => Some(ArtifactKind::Snippet),
            EventType::DocChunk => Some(ArtifactKind::DocChunk),
            EventType::ToolOutput => Some(ArtifactKind::ToolOutput),
            EventType::UserMessage | EventType::AssistantResponse => None,
        }
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::InvalidEventType(s.to_string()))
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event as persisted by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Store-assigned sequence number (creation order)
    pub seq: i64,

    pub session_id: String,

    pub event_type: EventType,

    pub payload: serde_json::Value,

    pub created_at: DateTime<Utc>,
}
