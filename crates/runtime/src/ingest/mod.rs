//! Getting events and artifacts into a session.
//!
//! Two explicit, composable steps:
//! - [`record_event`] always appends the event to the log.
//! - [`record_artifact`] creates an artifact only for artifact-bearing types
//!   whose payload carries non-empty `content`.
//!
//! [`ingest_event`] runs both. The snippet and git-diff helpers build their
//! own artifacts and events directly.

pub mod git_diff;
pub mod snippet;

use mnemo_core::{EventType, NewArtifact, Result, Store, StoreResultExt};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

pub use git_diff::{collect_git_diff, ingest_git_diff};
pub use snippet::{SnippetRequest, ingest_snippet};

/// Payload keys consumed by the artifact itself rather than kept as meta.
const RESERVED_KEYS: [&str; 3] = ["content", "versionHash", "pinned"];

/// What one `ingest_event` call wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub seq: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
}

/// First 16 hex chars of the SHA-256 of `content`.
pub fn content_hash(content: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(content.as_bytes()));
    digest[..16].to_string()
}

/// Append an event to the session log.
pub async fn record_event(
    store: &dyn Store,
    session_id: &str,
    event_type: EventType,
    payload: &Value,
) -> Result<i64> {
    let seq = store
        .append_event(session_id, event_type, payload)
        .await
        .context("append_event", session_id)?;
    debug!(session_id, seq, event_type = %event_type, "Recorded event");
    Ok(seq)
}

/// The artifact an event payload describes, if it describes one.
///
/// - `source`: `payload.source`, else `payload.path`, else `"unknown"`
/// - `versionHash`: `payload.versionHash`, else [`content_hash`]
/// - `pinned`: only a literal `true`
/// - meta: every other key, omitted when none remain
pub fn artifact_from_payload(event_type: EventType, payload: &Value) -> Option<NewArtifact> {
    let kind = event_type.artifact_kind()?;
    let fields = payload.as_object()?;
    let content = fields
        .get("content")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())?;

    let str_field = |key: &str| fields.get(key).and_then(Value::as_str);
    let source = str_field("source").or_else(|| str_field("path")).unwrap_or("unknown");
    let version_hash = str_field("versionHash")
        .map(str::to_string)
        .unwrap_or_else(|| content_hash(content));
    let pinned = fields.get("pinned") == Some(&Value::Bool(true));

    let meta: serde_json::Map<String, Value> = fields
        .iter()
        .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Some(
        NewArtifact::new(kind, source, version_hash, content)
            .with_meta(meta)
            .pinned(pinned),
    )
}

/// Store the artifact an event payload describes. `Ok(None)` if it has none.
pub async fn record_artifact(
    store: &dyn Store,
    session_id: &str,
    event_type: EventType,
    payload: &Value,
) -> Result<Option<String>> {
    let Some(artifact) = artifact_from_payload(event_type, payload) else {
        return Ok(None);
    };
    let artifact_id = store
        .put_artifact(session_id, artifact)
        .await
        .context("put_artifact", session_id)?;
    Ok(Some(artifact_id))
}

/// Record the event, then its artifact if it carries one.
pub async fn ingest_event(
    store: &dyn Store,
    session_id: &str,
    event_type: EventType,
    payload: &Value,
) -> Result<IngestOutcome> {
    let seq = record_event(store, session_id, event_type, payload).await?;
    let artifact_id = record_artifact(store, session_id, event_type, payload).await?;
    Ok(IngestOutcome { seq, artifact_id })
}

/// [`ingest_event`] for an untyped event name, e.g. from a wire request.
///
/// Unknown names fail with `InvalidEventType` before anything is written.
pub async fn ingest_raw(
    store: &dyn Store,
    session_id: &str,
    event_type: &str,
    payload: &Value,
) -> Result<IngestOutcome> {
    let event_type: EventType = event_type.parse()?;
    ingest_event(store, session_id, event_type, payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::{ArtifactKind, Error};
    use mnemo_store::InMemoryStore;
    use serde_json::json;

    async fn store_with_session() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.upsert_session("s", "{}").await.unwrap();
        store
    }

    #[test]
    fn hash_is_sixteen_hex_chars() {
        let h = content_hash("hello");
        assert_eq!(h, "2cf24dba5fb0a30e");
        assert_eq!(content_hash("hello"), h);
    }

    #[test]
    fn payload_mapping_follows_precedence() {
        let a = artifact_from_payload(
            EventType::DocChunk,
            &json!({"content": "text", "path": "docs/a.md", "pinned": true, "page": 3}),
        )
        .unwrap();
        assert_eq!(a.kind, ArtifactKind::DocChunk);
        assert_eq!(a.source, "docs/a.md");
        assert_eq!(a.version_hash, content_hash("text"));
        assert!(a.pinned);
        assert_eq!(a.meta.len(), 2);
        assert_eq!(a.meta["path"], "docs/a.md");
        assert_eq!(a.meta["page"], 3);

        let b = artifact_from_payload(
            EventType::ToolOutput,
            &json!({"content": "out", "source": "cargo", "path": "x", "versionHash": "v1", "pinned": "yes"}),
        )
        .unwrap();
        assert_eq!(b.source, "cargo");
        assert_eq!(b.version_hash, "v1");
        assert!(!b.pinned);

        let c = artifact_from_payload(EventType::Snippet, &json!({"content": "x"})).unwrap();
        assert_eq!(c.source, "unknown");
        assert!(c.meta.is_empty());
    }

    #[test]
    fn no_artifact_without_content_or_for_plain_events() {
        assert!(artifact_from_payload(EventType::Snippet, &json!({"path": "a.rs"})).is_none());
        assert!(artifact_from_payload(EventType::Snippet, &json!({"content": ""})).is_none());
        assert!(
            artifact_from_payload(EventType::UserMessage, &json!({"content": "hi"})).is_none()
        );
    }

    #[tokio::test]
    async fn ingest_records_event_and_artifact() {
        let store = store_with_session().await;
        let outcome = ingest_event(
            &store,
            "s",
            EventType::Snippet,
            &json!({"content": "fn a() {}", "path": "src/a.rs"}),
        )
        .await
        .unwrap();
        assert!(outcome.artifact_id.is_some());

        let events = store.list_recent_events("s", &[], 10).await.unwrap();
        assert_eq!(events.len(), 1);
        let artifacts = store.list_recent_artifacts("s", &[], 10).await.unwrap();
        assert_eq!(artifacts[0].path(), "src/a.rs");
    }

    #[tokio::test]
    async fn user_message_is_event_only() {
        let store = store_with_session().await;
        let outcome = ingest_event(&store, "s", EventType::UserMessage, &json!({"text": "hi"}))
            .await
            .unwrap();
        assert!(outcome.artifact_id.is_none());
        assert!(store.list_recent_artifacts("s", &[], 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_type_writes_nothing() {
        let store = store_with_session().await;
        let err = ingest_raw(&store, "s", "telepathy", &json!({"content": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEventType(ref t) if t == "telepathy"));
        assert!(store.list_recent_events("s", &[], 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_session_is_session_not_found() {
        let store = InMemoryStore::new();
        let err = ingest_event(&store, "ghost", EventType::UserMessage, &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }
}
