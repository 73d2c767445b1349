//! In-memory store, useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use mnemo_core::artifact::{Artifact, ArtifactKind, NewArtifact};
use mnemo_core::error::StoreError;
use mnemo_core::event::{EventType, StoredEvent};
use mnemo_core::store::{SessionRecord, Store};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    sessions: HashMap<String, SessionRecord>,
    events: Vec<StoredEvent>,
    artifacts: Vec<Artifact>,
}

/// A store that keeps everything in process memory.
/// Follows the same rules as the SQLite store, including rejecting writes
/// for sessions that were never created.
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.tables.read().await.sessions.get(session_id).cloned())
    }

    async fn upsert_session(&self, session_id: &str, state_json: &str) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        tables
            .sessions
            .entry(session_id.to_string())
            .and_modify(|s| {
                s.state_json = state_json.to_string();
                s.version += 1;
                s.updated_at = now;
            })
            .or_insert_with(|| SessionRecord {
                session_id: session_id.to_string(),
                state_json: state_json.to_string(),
                version: 1,
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }

    async fn append_event(
        &self,
        session_id: &str,
        event_type: EventType,
        payload: &serde_json::Value,
    ) -> Result<i64, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.sessions.contains_key(session_id) {
            return Err(StoreError::UnknownSession(session_id.to_string()));
        }
        let seq = tables.events.len() as i64 + 1;
        tables.events.push(StoredEvent {
            seq,
            session_id: session_id.to_string(),
            event_type,
            payload: payload.clone(),
            created_at: Utc::now(),
        });
        Ok(seq)
    }

    async fn list_recent_events(
        &self,
        session_id: &str,
        types: &[EventType],
        limit: usize,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .iter()
            .rev()
            .filter(|e| e.session_id == session_id)
            .filter(|e| types.is_empty() || types.contains(&e.event_type))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn put_artifact(
        &self,
        session_id: &str,
        artifact: NewArtifact,
    ) -> Result<String, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.sessions.contains_key(session_id) {
            return Err(StoreError::UnknownSession(session_id.to_string()));
        }
        let artifact_id = Uuid::new_v4().to_string();
        tables.artifacts.push(Artifact {
            artifact_id: artifact_id.clone(),
            session_id: session_id.to_string(),
            kind: artifact.kind,
            source: artifact.source,
            version_hash: artifact.version_hash,
            content: artifact.content,
            meta: artifact.meta,
            pinned: artifact.pinned,
            created_at: Utc::now(),
        });
        Ok(artifact_id)
    }

    async fn list_recent_artifacts(
        &self,
        session_id: &str,
        kinds: &[ArtifactKind],
        limit: usize,
    ) -> Result<Vec<Artifact>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .artifacts
            .iter()
            .rev()
            .filter(|a| a.session_id == session_id)
            .filter(|a| kinds.is_empty() || kinds.contains(&a.kind))
            .take(limit)
            .cloned()
            .collect())
    }
}
