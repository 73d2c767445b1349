//! Budget allocation: decides include / truncate / drop per candidate.
//!
//! The allocator makes `token_estimate <= budget_tokens` true by
//! construction: `remaining` never goes below zero, and the estimate is
//! reported as `budget_tokens - remaining`.
//!
//! The ceiling covers the reported estimate only. It counts the policy
//! prefix, compact state JSON, artifact bodies, and the fixed reserves. The
//! formatter's pretty-printed state and per-evidence framing (headings,
//! priority lines, fences) are not counted, so the rendered messages can
//! estimate above `budget_tokens` when many small artifacts are included.
//!
//! Pinned candidates are processed first and are never dropped; when they do
//! not fit they are truncated (with at least `min_pinned_chars` kept).
//! Unpinned candidates follow in selector order; a high-priority one that
//! does not fit is truncated into the remaining space, anything else that
//! does not fit is dropped.

use crate::compile::select::EvidenceItem;
use crate::compile::token::{CHARS_PER_TOKEN, char_prefix, estimate_tokens};
use mnemo_config::BudgetOverrides;
use mnemo_core::{Result, SessionState};
use serde::Serialize;

pub const DEFAULT_USER_MESSAGE_RESERVE: usize = 100;
pub const DEFAULT_MESSAGE_OVERHEAD: usize = 50;
pub const DEFAULT_HIGH_PRIORITY_THRESHOLD: i32 = 80;
pub const DEFAULT_MIN_TRUNCATION_TOKENS: usize = 100;
pub const DEFAULT_MIN_PINNED_CHARS: usize = 100;

/// Appended to every truncated artifact body.
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// Allocator constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetPolicy {
    /// Tokens held back for the user turn
    pub user_message_reserve: usize,
    /// Fixed structural cost of the message envelope
    pub message_overhead: usize,
    /// Unpinned items at or above this priority may be truncated instead of dropped
    pub high_priority_threshold: i32,
    /// Unpinned truncation needs strictly more remaining tokens than this
    pub min_truncation_tokens: usize,
    /// Floor on kept characters for a truncated pinned item
    pub min_pinned_chars: usize,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            user_message_reserve: DEFAULT_USER_MESSAGE_RESERVE,
            message_overhead: DEFAULT_MESSAGE_OVERHEAD,
            high_priority_threshold: DEFAULT_HIGH_PRIORITY_THRESHOLD,
            min_truncation_tokens: DEFAULT_MIN_TRUNCATION_TOKENS,
            min_pinned_chars: DEFAULT_MIN_PINNED_CHARS,
        }
    }
}

impl BudgetPolicy {
    pub fn from_overrides(o: &BudgetOverrides) -> Self {
        let d = Self::default();
        Self {
            user_message_reserve: o.user_message_reserve.unwrap_or(d.user_message_reserve),
            message_overhead: o.message_overhead.unwrap_or(d.message_overhead),
            high_priority_threshold: o
                .high_priority_threshold
                .unwrap_or(d.high_priority_threshold),
            min_truncation_tokens: o.min_truncation_tokens.unwrap_or(d.min_truncation_tokens),
            min_pinned_chars: o.min_pinned_chars.unwrap_or(d.min_pinned_chars),
        }
    }
}

/// The allocator's decision for one compile call.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetResult {
    pub included: Vec<EvidenceItem>,
    pub dropped: Vec<EvidenceItem>,
    pub token_estimate: usize,
    pub rationale: String,
}

/// Fit ranked candidates into `budget_tokens`.
pub fn apply_budget(
    candidates: Vec<EvidenceItem>,
    state: &SessionState,
    budget_tokens: usize,
    policy_prefix: Option<&str>,
    policy: &BudgetPolicy,
) -> Result<BudgetResult> {
    let prefix_tokens = policy_prefix.map(estimate_tokens).unwrap_or(0);
    let state_tokens = estimate_tokens(&state.to_json()?);
    let overhead =
        prefix_tokens + state_tokens + policy.user_message_reserve + policy.message_overhead;

    let mut remaining = budget_tokens.saturating_sub(overhead);
    let mut included = Vec::new();
    let mut dropped = Vec::new();

    let (pinned, unpinned): (Vec<_>, Vec<_>) =
        candidates.into_iter().partition(|item| item.artifact.pinned);

    for mut item in pinned {
        let tokens = estimate_tokens(&item.artifact.content);
        if tokens <= remaining {
            remaining -= tokens;
        } else {
            let max_chars = truncation_chars(remaining).max(policy.min_pinned_chars);
            truncate(&mut item, max_chars, " (pinned, truncated to fit budget)");
            remaining = 0;
        }
        included.push(item);
    }

    for mut item in unpinned {
        let tokens = estimate_tokens(&item.artifact.content);
        if tokens <= remaining {
            remaining -= tokens;
            included.push(item);
        } else if item.priority >= policy.high_priority_threshold
            && remaining > policy.min_truncation_tokens
        {
            truncate(&mut item, truncation_chars(remaining), " (truncated to fit budget)");
            remaining = 0;
            included.push(item);
        } else {
            dropped.push(item);
        }
    }

    let token_estimate = budget_tokens - remaining;
    let rationale = format!(
        "Included {} artifacts ({} tokens), dropped {} to fit {} token budget",
        included.len(),
        token_estimate,
        dropped.len(),
        budget_tokens
    );

    Ok(BudgetResult {
        included,
        dropped,
        token_estimate,
        rationale,
    })
}

/// Characters that fit in `remaining` tokens once the marker is paid for.
fn truncation_chars(remaining: usize) -> usize {
    remaining.saturating_sub(estimate_tokens(TRUNCATION_MARKER)) * CHARS_PER_TOKEN
}

fn truncate(item: &mut EvidenceItem, max_chars: usize, note: &str) {
    let mut content = char_prefix(&item.artifact.content, max_chars).to_string();
    content.push_str(TRUNCATION_MARKER);
    item.artifact.content = content;
    item.rationale.push_str(note);
}
