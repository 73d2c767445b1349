//! Store trait — persistent, session-scoped event log and artifact table.
//!
//! The store is a collaborator of the runtime, not part of it: the runtime
//! only relies on this contract. Every operation is fail-fast; nothing here
//! retries or degrades silently.
//!
//! Implementations: SQLite (durable), in-memory (tests, ephemeral sessions).

use crate::artifact::{Artifact, ArtifactKind, NewArtifact};
use crate::error::StoreError;
use crate::event::{EventType, StoredEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted session row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,

    /// The serialized [`SessionState`](crate::state::SessionState)
    pub state_json: String,

    /// Incremented on every upsert, starting at 1
    pub version: i64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// The core Store trait.
#[async_trait]
pub trait Store: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Fetch a session row, `None` if it was never created.
    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Create the session or overwrite its state snapshot.
    async fn upsert_session(&self, session_id: &str, state_json: &str) -> Result<(), StoreError>;

    /// Append an event and return its sequence number.
    async fn append_event(
        &self,
        session_id: &str,
        event_type: EventType,
        payload: &serde_json::Value,
    ) -> Result<i64, StoreError>;

    /// Most recent events first. An empty `types` slice means all types.
    async fn list_recent_events(
        &self,
        session_id: &str,
        types: &[EventType],
        limit: usize,
    ) -> Result<Vec<StoredEvent>, StoreError>;

    /// Store a new artifact and return its id.
    async fn put_artifact(
        &self,
        session_id: &str,
        artifact: NewArtifact,
    ) -> Result<String, StoreError>;

    /// Most recently stored artifacts first. An empty `kinds` slice means all kinds.
    async fn list_recent_artifacts(
        &self,
        session_id: &str,
        kinds: &[ArtifactKind],
        limit: usize,
    ) -> Result<Vec<Artifact>, StoreError>;
}
