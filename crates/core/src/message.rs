//! Message domain types.
//!
//! A compiled context is an ordered sequence of role-tagged messages.
//! Compiled messages carry no ids or timestamps: two compiles over the same
//! store contents must serialize to identical bytes.

use serde::{Deserialize, Serialize};

/// The role of a compiled message.
///
/// Model input only ever carries `system` and `user` messages. Assistant
/// text is recorded as an event, never replayed as an `assistant` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Policy preamble, state snapshot, and evidence
    System,
    /// The verbatim user turn
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

/// A single compiled message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who the message is attributed to
    pub role: Role,

    /// The text content
    pub content: String,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}
