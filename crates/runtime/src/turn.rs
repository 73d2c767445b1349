//! One chat turn: ingest → (diff) → compile → model → observe.
//!
//! The model client is injected. Choosing between a live API, a stub, or a
//! fallback chain is the caller's business; a model failure surfaces as
//! [`Error::Model`](mnemo_core::Error::Model) after the user message has
//! already been recorded.

use crate::compile::{CompileDebug, CompileOptions};
use crate::session::Session;
use mnemo_core::{EventType, ModelClient, Result, SessionState};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct TurnOptions {
    pub budget_tokens: usize,
    /// Ingest `git diff HEAD` from this repository before compiling.
    pub auto_diff: Option<String>,
}

impl TurnOptions {
    pub fn new(budget_tokens: usize) -> Self {
        Self {
            budget_tokens,
            auto_diff: None,
        }
    }

    pub fn with_auto_diff(mut self, repo_path: impl Into<String>) -> Self {
        self.auto_diff = Some(repo_path.into());
        self
    }
}

/// What one turn produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub reply: String,
    pub debug: CompileDebug,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_artifact: Option<String>,
    pub state: SessionState,
}

pub async fn run_turn(
    session: &Session,
    model: &dyn ModelClient,
    user_message: &str,
    options: &TurnOptions,
) -> Result<TurnOutcome> {
    session
        .ingest(EventType::UserMessage, &json!({ "text": user_message }))
        .await?;

    let diff_artifact = match &options.auto_diff {
        Some(repo) => session.ingest_git_diff(repo).await?,
        None => None,
    };
    if let Some(id) = &diff_artifact {
        debug!(session_id = session.id(), artifact_id = %id, "Auto-ingested git diff");
    }

    let compiled = session
        .compile(&CompileOptions::new(user_message, options.budget_tokens))
        .await?;

    let reply = model.complete(&compiled.messages).await?;
    let state = session.observe(&reply).await?;

    info!(
        session_id = session.id(),
        model = model.name(),
        token_estimate = compiled.debug.token_estimate,
        decisions = state.decisions.len(),
        constraints = state.constraints.len(),
        open_threads = state.open_threads.len(),
        "Turn complete"
    );

    Ok(TurnOutcome {
        reply,
        debug: compiled.debug,
        diff_artifact,
        state,
    })
}
