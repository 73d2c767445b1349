//! Runtime and per-session handles.
//!
//! [`Runtime::session`] is idempotent get-or-create: the first reference to a
//! session id persists the empty default state. A [`Session`] is a cheap,
//! cloneable handle that forwards every operation to the shared store and
//! compiler.
//!
//! Sessions are independent; one session's turns should be serialized by
//! the caller (concurrent `observe` calls on the same session are
//! last-write-wins on the state snapshot).

use crate::compile::{CompileOptions, CompileResult, Compiler};
use crate::ingest::{self, IngestOutcome, SnippetRequest};
use crate::observe;
use mnemo_config::CompilerConfig;
use mnemo_core::{
    Error, EventType, Result, SessionRecord, SessionState, Store, StoreResultExt, StoredEvent,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Load and parse a session's state snapshot.
///
/// Fails with [`Error::SessionNotFound`] if the session was never created.
pub async fn load_state(store: &dyn Store, session_id: &str) -> Result<SessionState> {
    let record = store
        .get_session(session_id)
        .await
        .context("get_session", session_id)?
        .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
    Ok(SessionState::from_json(&record.state_json)?)
}

/// Entry point: a store plus a compiler, handing out sessions.
#[derive(Clone)]
pub struct Runtime {
    store: Arc<dyn Store>,
    compiler: Arc<Compiler>,
}

impl Runtime {
    /// A runtime with the default compiler policies and no prefix.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_compiler(store, Compiler::default())
    }

    pub fn with_compiler(store: Arc<dyn Store>, compiler: Compiler) -> Self {
        Self {
            store,
            compiler: Arc::new(compiler),
        }
    }

    /// A runtime configured from the `[compiler]` section.
    pub fn from_config(store: Arc<dyn Store>, config: &CompilerConfig) -> Result<Self> {
        Ok(Self::with_compiler(store, Compiler::from_config(config)?))
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    /// Get or create a session.
    pub async fn session(&self, session_id: &str) -> Result<Session> {
        if session_id.trim().is_empty() {
            return Err(Error::Config {
                message: "session id must not be empty".into(),
            });
        }

        let existing = self
            .store
            .get_session(session_id)
            .await
            .context("get_session", session_id)?;

        if existing.is_none() {
            self.store
                .upsert_session(session_id, &SessionState::default().to_json()?)
                .await
                .context("upsert_session", session_id)?;
            info!(session_id, store = self.store.name(), "Created session");
        }

        Ok(self.handle(session_id))
    }

    /// A handle on `session_id` without creating it. Reads, compiles and
    /// observes on a session that was never created fail with
    /// [`Error::SessionNotFound`].
    pub fn handle(&self, session_id: &str) -> Session {
        Session {
            id: session_id.to_string(),
            store: Arc::clone(&self.store),
            compiler: Arc::clone(&self.compiler),
        }
    }
}

/// A handle on one session.
#[derive(Clone)]
pub struct Session {
    id: String,
    store: Arc<dyn Store>,
    compiler: Arc<Compiler>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Record an event, plus its artifact when it carries content.
    pub async fn ingest(&self, event_type: EventType, payload: &Value) -> Result<IngestOutcome> {
        ingest::ingest_event(self.store.as_ref(), &self.id, event_type, payload).await
    }

    /// [`ingest`](Self::ingest) for an event type given by name.
    pub async fn ingest_raw(&self, event_type: &str, payload: &Value) -> Result<IngestOutcome> {
        ingest::ingest_raw(self.store.as_ref(), &self.id, event_type, payload).await
    }

    pub async fn ingest_snippet(&self, request: &SnippetRequest) -> Result<String> {
        ingest::ingest_snippet(self.store.as_ref(), &self.id, request).await
    }

    pub async fn ingest_git_diff(&self, repo_path: &str) -> Result<Option<String>> {
        ingest::ingest_git_diff(self.store.as_ref(), &self.id, repo_path).await
    }

    pub async fn compile(&self, options: &CompileOptions) -> Result<CompileResult> {
        self.compiler
            .compile(self.store.as_ref(), &self.id, options)
            .await
    }

    pub async fn observe(&self, assistant_text: &str) -> Result<SessionState> {
        observe::observe(self.store.as_ref(), &self.id, assistant_text).await
    }

    pub async fn state(&self) -> Result<SessionState> {
        load_state(self.store.as_ref(), &self.id).await
    }

    /// The raw persisted record, including its version counter.
    pub async fn record(&self) -> Result<SessionRecord> {
        self.store
            .get_session(&self.id)
            .await
            .context("get_session", &self.id)?
            .ok_or_else(|| Error::SessionNotFound(self.id.clone()))
    }

    /// Most recent events first. An empty `types` slice means all types.
    pub async fn events(&self, types: &[EventType], limit: usize) -> Result<Vec<StoredEvent>> {
        self.store
            .list_recent_events(&self.id, types, limit)
            .await
            .context("list_recent_events", &self.id)
    }
}
