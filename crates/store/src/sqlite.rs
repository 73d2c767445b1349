//! SQLite store.
//!
//! Uses a single SQLite database file with three tables:
//! - `sessions` — one state snapshot per session, with a version counter
//! - `events` — the append-only event log
//! - `artifacts` — immutable evidence units
//!
//! Events and artifacts reference their session by foreign key, so writes
//! against a session that was never created fail with `UnknownSession`.
//! "Recent" always means insertion order (`seq` / `iid` descending), never
//! wall-clock time, so two rows written in the same millisecond still order
//! deterministically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mnemo_core::artifact::{Artifact, ArtifactKind, NewArtifact};
use mnemo_core::error::StoreError;
use mnemo_core::event::{EventType, StoredEvent};
use mnemo_core::store::{SessionRecord, Store};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// A durable SQLite store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite store at a file path.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && !path.starts_with("sqlite:")
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Storage(format!("Cannot create {}: {e}", parent.display())))?;
        }

        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // An in-memory database lives and dies with its connection.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id  TEXT PRIMARY KEY,
                state_json  TEXT NOT NULL,
                version     INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id  TEXT NOT NULL REFERENCES sessions(session_id),
                event_type  TEXT NOT NULL,
                payload     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("events table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS artifacts (
                iid           INTEGER PRIMARY KEY AUTOINCREMENT,
                artifact_id   TEXT UNIQUE NOT NULL,
                session_id    TEXT NOT NULL REFERENCES sessions(session_id),
                kind          TEXT NOT NULL,
                source        TEXT NOT NULL,
                version_hash  TEXT NOT NULL,
                content       TEXT NOT NULL,
                meta          TEXT,
                pinned        INTEGER NOT NULL DEFAULT 0,
                created_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("artifacts table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id, seq DESC)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("events index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_artifacts_session ON artifacts(session_id, kind, iid DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("artifacts index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Map an insert error, turning FK violations into `UnknownSession`.
    fn write_error(session_id: &str, what: &str, e: sqlx::Error) -> StoreError {
        match e.as_database_error() {
            Some(db) if db.is_foreign_key_violation() => {
                StoreError::UnknownSession(session_id.to_string())
            }
            _ => StoreError::Storage(format!("{what} INSERT failed: {e}")),
        }
    }

    /// `?3, ?4, ...` placeholders for an `IN (...)` filter after two fixed binds.
    fn in_placeholders(count: usize) -> String {
        (0..count)
            .map(|i| format!("?{}", i + 3))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn parse_time(column: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Corrupt(format!("{column} '{value}': {e}")))
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord, StoreError> {
        let get = |col: &str| -> Result<String, StoreError> {
            row.try_get(col)
                .map_err(|e| StoreError::QueryFailed(format!("{col} column: {e}")))
        };
        let version: i64 = row
            .try_get("version")
            .map_err(|e| StoreError::QueryFailed(format!("version column: {e}")))?;

        Ok(SessionRecord {
            session_id: get("session_id")?,
            state_json: get("state_json")?,
            version,
            created_at: Self::parse_time("created_at", &get("created_at")?)?,
            updated_at: Self::parse_time("updated_at", &get("updated_at")?)?,
        })
    }

    fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<StoredEvent, StoreError> {
        let seq: i64 = row
            .try_get("seq")
            .map_err(|e| StoreError::QueryFailed(format!("seq column: {e}")))?;
        let session_id: String = row
            .try_get("session_id")
            .map_err(|e| StoreError::QueryFailed(format!("session_id column: {e}")))?;
        let event_type: String = row
            .try_get("event_type")
            .map_err(|e| StoreError::QueryFailed(format!("event_type column: {e}")))?;
        let payload: String = row
            .try_get("payload")
            .map_err(|e| StoreError::QueryFailed(format!("payload column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        Ok(StoredEvent {
            seq,
            session_id,
            event_type: event_type
                .parse()
                .map_err(|_| StoreError::Corrupt(format!("event {seq} has type '{event_type}'")))?,
            payload: serde_json::from_str(&payload)
                .map_err(|e| StoreError::Corrupt(format!("event {seq} payload: {e}")))?,
            created_at: Self::parse_time("created_at", &created_at)?,
        })
    }

    fn row_to_artifact(row: &sqlx::sqlite::SqliteRow) -> Result<Artifact, StoreError> {
        let get = |col: &str| -> Result<String, StoreError> {
            row.try_get(col)
                .map_err(|e| StoreError::QueryFailed(format!("{col} column: {e}")))
        };
        let artifact_id = get("artifact_id")?;
        let kind = get("kind")?;
        let meta: Option<String> = row
            .try_get("meta")
            .map_err(|e| StoreError::QueryFailed(format!("meta column: {e}")))?;
        let pinned: bool = row
            .try_get("pinned")
            .map_err(|e| StoreError::QueryFailed(format!("pinned column: {e}")))?;

        let meta = match meta {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| StoreError::Corrupt(format!("artifact {artifact_id} meta: {e}")))?,
            None => serde_json::Map::new(),
        };

        Ok(Artifact {
            kind: kind
                .parse::<ArtifactKind>()
                .map_err(|e| StoreError::Corrupt(format!("artifact {artifact_id}: {e}")))?,
            session_id: get("session_id")?,
            source: get("source")?,
            version_hash: get("version_hash")?,
            content: get("content")?,
            meta,
            pinned,
            created_at: Self::parse_time("created_at", &get("created_at")?)?,
            artifact_id,
        })
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE session_id = ?1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Get session: {e}")))?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn upsert_session(&self, session_id: &str, state_json: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, state_json, version, created_at, updated_at)
            VALUES (?1, ?2, 1, ?3, ?3)
            ON CONFLICT(session_id) DO UPDATE SET
                state_json = excluded.state_json,
                version = sessions.version + 1,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(session_id)
        .bind(state_json)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Session UPSERT failed: {e}")))?;

        debug!(session_id, "Upserted session state");
        Ok(())
    }

    async fn append_event(
        &self,
        session_id: &str,
        event_type: EventType,
        payload: &serde_json::Value,
    ) -> Result<i64, StoreError> {
        let payload = serde_json::to_string(payload)
            .map_err(|e| StoreError::Storage(format!("Payload serialization: {e}")))?;

        let result = sqlx::query(
            "INSERT INTO events (session_id, event_type, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(session_id)
        .bind(event_type.as_str())
        .bind(&payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Self::write_error(session_id, "Event", e))?;

        let seq = result.last_insert_rowid();
        debug!(session_id, seq, event_type = %event_type, "Appended event");
        Ok(seq)
    }

    async fn list_recent_events(
        &self,
        session_id: &str,
        types: &[EventType],
        limit: usize,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let sql = if types.is_empty() {
            "SELECT * FROM events WHERE session_id = ?1 ORDER BY seq DESC LIMIT ?2".to_string()
        } else {
            format!(
                "SELECT * FROM events WHERE session_id = ?1 AND event_type IN ({}) ORDER BY seq DESC LIMIT ?2",
                Self::in_placeholders(types.len())
            )
        };

        let mut query = sqlx::query(&sql).bind(session_id).bind(limit as i64);
        for t in types {
            query = query.bind(t.as_str());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("List events: {e}")))?;

        rows.iter().map(Self::row_to_event).collect()
    }

    async fn put_artifact(
        &self,
        session_id: &str,
        artifact: NewArtifact,
    ) -> Result<String, StoreError> {
        let artifact_id = Uuid::new_v4().to_string();
        let meta = if artifact.meta.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&artifact.meta)
                    .map_err(|e| StoreError::Storage(format!("Meta serialization: {e}")))?,
            )
        };

        sqlx::query(
            r#"
            INSERT INTO artifacts
                (artifact_id, session_id, kind, source, version_hash, content, meta, pinned, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&artifact_id)
        .bind(session_id)
        .bind(artifact.kind.as_str())
        .bind(&artifact.source)
        .bind(&artifact.version_hash)
        .bind(&artifact.content)
        .bind(meta.as_deref())
        .bind(artifact.pinned)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Self::write_error(session_id, "Artifact", e))?;

        debug!(session_id, %artifact_id, kind = %artifact.kind, pinned = artifact.pinned, "Stored artifact");
        Ok(artifact_id)
    }

    async fn list_recent_artifacts(
        &self,
        session_id: &str,
        kinds: &[ArtifactKind],
        limit: usize,
    ) -> Result<Vec<Artifact>, StoreError> {
        let sql = if kinds.is_empty() {
            "SELECT * FROM artifacts WHERE session_id = ?1 ORDER BY iid DESC LIMIT ?2".to_string()
        } else {
            format!(
                "SELECT * FROM artifacts WHERE session_id = ?1 AND kind IN ({}) ORDER BY iid DESC LIMIT ?2",
                Self::in_placeholders(kinds.len())
            )
        };

        let mut query = sqlx::query(&sql).bind(session_id).bind(limit as i64);
        for k in kinds {
            query = query.bind(k.as_str());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("List artifacts: {e}")))?;

        rows.iter().map(Self::row_to_artifact).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn upsert_creates_then_bumps_version() {
        let store = test_store().await;
        assert!(store.get_session("s1").await.unwrap().is_none());

        store.upsert_session("s1", "{}").await.unwrap();
        let first = store.get_session("s1").await.unwrap().unwrap();
        assert_eq!(first.version, 1);

        store
            .upsert_session("s1", r#"{"constraints":["x"]}"#)
            .await
            .unwrap();
        let second = store.get_session("s1").await.unwrap().unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(second.state_json, r#"{"constraints":["x"]}"#);
        assert_eq!(second.created_at, first.created_at);
    }

    #[tokio::test]
    async fn events_list_newest_first_with_type_filter() {
        let store = test_store().await;
        store.upsert_session("s1", "{}").await.unwrap();

        let a = store
            .append_event("s1", EventType::UserMessage, &json!({"text": "one"}))
            .await
            .unwrap();
        store
            .append_event("s1", EventType::Snippet, &json!({"path": "a.rs"}))
            .await
            .unwrap();
        let c = store
            .append_event("s1", EventType::UserMessage, &json!({"text": "two"}))
            .await
            .unwrap();
        assert!(c > a);

        let all = store.list_recent_events("s1", &[], 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].seq, c);

        let users = store
            .list_recent_events("s1", &[EventType::UserMessage], 10)
            .await
            .unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].payload["text"], "two");
        assert_eq!(users[1].payload["text"], "one");
    }

    #[tokio::test]
    async fn writes_to_unknown_session_fail() {
        let store = test_store().await;
        let err = store
            .append_event("ghost", EventType::UserMessage, &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownSession(ref id) if id == "ghost"));

        let err = store
            .put_artifact(
                "ghost",
                NewArtifact::new(ArtifactKind::Snippet, "a.rs", "h", "fn a() {}"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownSession(_)));
    }

    #[tokio::test]
    async fn artifacts_round_trip_with_meta_and_pin() {
        let store = test_store().await;
        store.upsert_session("s1", "{}").await.unwrap();

        let meta = json!({"path": "src/lib.rs", "startLine": 1, "endLine": 3});
        let id = store
            .put_artifact(
                "s1",
                NewArtifact::new(ArtifactKind::Snippet, "src/lib.rs", "abc123", "pub mod a;")
                    .with_meta(meta.as_object().cloned().unwrap())
                    .pinned(true),
            )
            .await
            .unwrap();

        let found = store
            .list_recent_artifacts("s1", &[ArtifactKind::Snippet], 5)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        let a = &found[0];
        assert_eq!(a.artifact_id, id);
        assert!(a.pinned);
        assert_eq!(a.meta["startLine"], 1);
        assert_eq!(a.path(), "src/lib.rs");
    }

    #[tokio::test]
    async fn artifact_listing_respects_kind_limit_and_session() {
        let store = test_store().await;
        store.upsert_session("s1", "{}").await.unwrap();
        store.upsert_session("s2", "{}").await.unwrap();

        for i in 0..5 {
            store
                .put_artifact(
                    "s1",
                    NewArtifact::new(ArtifactKind::Snippet, format!("f{i}.rs"), "h", "x"),
                )
                .await
                .unwrap();
        }
        store
            .put_artifact("s1", NewArtifact::new(ArtifactKind::DocChunk, "README", "h", "doc"))
            .await
            .unwrap();
        store
            .put_artifact("s2", NewArtifact::new(ArtifactKind::Snippet, "other.rs", "h", "x"))
            .await
            .unwrap();

        let snippets = store
            .list_recent_artifacts("s1", &[ArtifactKind::Snippet], 3)
            .await
            .unwrap();
        let sources: Vec<_> = snippets.iter().map(|a| a.source.as_str()).collect();
        assert_eq!(sources, vec!["f4.rs", "f3.rs", "f2.rs"]);

        let mixed = store
            .list_recent_artifacts("s1", &[ArtifactKind::DocChunk, ArtifactKind::ToolOutput], 10)
            .await
            .unwrap();
        assert_eq!(mixed.len(), 1);
        assert_eq!(mixed[0].kind, ArtifactKind::DocChunk);
    }

    #[tokio::test]
    async fn file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("runtime.sqlite");
        let path = path.to_str().unwrap();

        {
            let store = SqliteStore::new(path).await.unwrap();
            store.upsert_session("s1", r#"{"constraints":["keep"]}"#).await.unwrap();
        }

        let reopened = SqliteStore::new(path).await.unwrap();
        let session = reopened.get_session("s1").await.unwrap().unwrap();
        assert!(session.state_json.contains("keep"));
    }
}
