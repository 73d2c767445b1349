//! Renders the allocator's output as model input.
//!
//! Always exactly two messages: a system message (policy prefix, state
//! snapshot, evidence blocks in allocator order) and the verbatim user turn.
//! Nothing here re-sorts or filters.

use crate::compile::select::EvidenceItem;
use mnemo_core::{Message, Result, SessionState};

/// Everything the formatter needs for one compile call.
pub struct FormatInput<'a> {
    pub policy_prefix: Option<&'a str>,
    pub state: &'a SessionState,
    pub evidence: &'a [EvidenceItem],
    pub user_message: &'a str,
}

/// Build the `[system, user]` message pair.
pub fn format_messages(input: &FormatInput<'_>) -> Result<Vec<Message>> {
    let mut parts: Vec<String> = Vec::new();

    if let Some(prefix) = input.policy_prefix.filter(|p| !p.is_empty()) {
        parts.push(prefix.to_string());
    }

    parts.push("# Session State\n".into());
    parts.push("```json".into());
    parts.push(serde_json::to_string_pretty(input.state)?);
    parts.push("```".into());

    if !input.evidence.is_empty() {
        parts.push("\n# Evidence\n".into());
        for item in input.evidence {
            parts.push(format!("## {}: {}", item.artifact.kind, item.artifact.path()));
            parts.push(format!("Priority: {} - {}\n", item.priority, item.rationale));
            parts.push("```".into());
            parts.push(item.artifact.content.clone());
            parts.push("```\n".into());
        }
    }

    Ok(vec![
        Message::system(parts.join("\n")),
        Message::user(input.user_message),
    ])
}
