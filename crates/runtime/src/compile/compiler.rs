//! The compiler. Wires selection, budgeting and formatting into one call.
//!
//! # Determinism
//!
//! `compile` reads the session state and every evidence window first, then
//! runs a pure pipeline over them. Identical store contents, user message
//! and budget always produce byte-identical messages. Compilation never
//! writes to the store.

use crate::compile::budget::{BudgetPolicy, apply_budget};
use crate::compile::format::{FormatInput, format_messages};
use crate::compile::select::{EvidenceItem, EvidenceWindows, SelectionPolicy, rank_evidence};
use crate::session::load_state;
use mnemo_config::CompilerConfig;
use mnemo_core::{Error, Message, Result, SessionState, Store};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ── Types ─────────────────────────────────────────────────────────────────

/// Per-call compile inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    pub user_message: String,
    pub budget_tokens: usize,
    /// Overrides the compiler's default prefix for this call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable_prefix: Option<String>,
}

impl CompileOptions {
    pub fn new(user_message: impl Into<String>, budget_tokens: usize) -> Self {
        Self {
            user_message: user_message.into(),
            budget_tokens,
            stable_prefix: None,
        }
    }

    pub fn with_stable_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.stable_prefix = Some(prefix.into());
        self
    }
}

/// What the compiler decided, for logs and assertions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileDebug {
    pub included_artifacts: Vec<String>,
    pub dropped_artifacts: Vec<String>,
    pub token_estimate: usize,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileResult {
    pub messages: Vec<Message>,
    pub debug: CompileDebug,
}

// ── Compiler ──────────────────────────────────────────────────────────────

/// The context compiler. Stateless apart from its policies; share it freely.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    selection: SelectionPolicy,
    budget: BudgetPolicy,
    stable_prefix: Option<String>,
}

impl Compiler {
    pub fn new(selection: SelectionPolicy, budget: BudgetPolicy) -> Self {
        Self {
            selection,
            budget,
            stable_prefix: None,
        }
    }

    /// Prefix used when a call does not bring its own.
    pub fn with_stable_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.stable_prefix = Some(prefix.into());
        self
    }

    /// Build from the `[compiler]` config section.
    pub fn from_config(config: &CompilerConfig) -> Result<Self> {
        let selection = SelectionPolicy::from_overrides(&config.selection)?;
        let budget = BudgetPolicy::from_overrides(&config.budget);

        if budget.high_priority_threshold > selection.max_priority() {
            return Err(Error::Config {
                message: format!(
                    "high_priority_threshold ({}) is above every selection tier (max {})",
                    budget.high_priority_threshold,
                    selection.max_priority()
                ),
            });
        }

        Ok(Self {
            selection,
            budget,
            stable_prefix: config.stable_prefix.clone(),
        })
    }

    pub fn selection(&self) -> &SelectionPolicy {
        &self.selection
    }

    pub fn budget(&self) -> &BudgetPolicy {
        &self.budget
    }

    pub fn stable_prefix(&self) -> Option<&str> {
        self.stable_prefix.as_deref()
    }

    /// Compile one turn's context from the store.
    ///
    /// Fails with [`Error::SessionNotFound`] if the session was never created.
    pub async fn compile(
        &self,
        store: &dyn Store,
        session_id: &str,
        options: &CompileOptions,
    ) -> Result<CompileResult> {
        let state = load_state(store, session_id).await?;
        let windows = EvidenceWindows::load(store, session_id, &self.selection).await?;
        let result = self.compile_loaded(&state, windows, options)?;

        info!(
            session_id,
            included = result.debug.included_artifacts.len(),
            dropped = result.debug.dropped_artifacts.len(),
            token_estimate = result.debug.token_estimate,
            budget = options.budget_tokens,
            "Compiled context"
        );
        Ok(result)
    }

    /// The pure half of [`compile`](Self::compile): rank, budget, format.
    pub fn compile_loaded(
        &self,
        state: &SessionState,
        windows: EvidenceWindows,
        options: &CompileOptions,
    ) -> Result<CompileResult> {
        let prefix = options
            .stable_prefix
            .as_deref()
            .or(self.stable_prefix.as_deref());

        let candidates = rank_evidence(windows, &options.user_message, state, &self.selection);
        debug!(candidates = candidates.len(), "Selected evidence");

        let budgeted = apply_budget(
            candidates,
            state,
            options.budget_tokens,
            prefix,
            &self.budget,
        )?;
        debug!(
            included = budgeted.included.len(),
            dropped = budgeted.dropped.len(),
            "Applied budget"
        );

        let messages = format_messages(&FormatInput {
            policy_prefix: prefix,
            state,
            evidence: &budgeted.included,
            user_message: &options.user_message,
        })?;

        let ids = |items: &[EvidenceItem]| {
            items
                .iter()
                .map(|i| i.artifact.artifact_id.clone())
                .collect::<Vec<_>>()
        };

        Ok(CompileResult {
            debug: CompileDebug {
                included_artifacts: ids(&budgeted.included),
                dropped_artifacts: ids(&budgeted.dropped),
                token_estimate: budgeted.token_estimate,
                rationale: budgeted.rationale,
            },
            messages,
        })
    }
}
