//! Fold an assistant reply back into session state.
//!
//! The reply is always logged as an `assistant_response` event, markers or
//! not. Extracted items are merged with the per-collection rules from
//! [`SessionState::apply`] and the merged state overwrites the snapshot.

pub mod extract;

use crate::session::load_state;
use chrono::Utc;
use mnemo_core::{EventType, Result, SessionState, Store, StoreResultExt};
use tracing::debug;

pub use extract::{Extracted, MARKER_PROMPT, extract_markers};

/// Record `assistant_text` and merge its markers into the session state.
///
/// Returns the state as persisted.
pub async fn observe(
    store: &dyn Store,
    session_id: &str,
    assistant_text: &str,
) -> Result<SessionState> {
    let now = Utc::now();
    let state = load_state(store, session_id).await?;

    store
        .append_event(
            session_id,
            EventType::AssistantResponse,
            &serde_json::json!({
                "text": assistant_text,
                "timestamp": now.to_rfc3339(),
            }),
        )
        .await
        .context("append_event", session_id)?;

    let extracted = extract_markers(assistant_text);
    debug!(
        session_id,
        decisions = extracted.decisions.len(),
        constraints = extracted.constraints.len(),
        open_threads = extracted.open_threads.len(),
        glossary = extracted.glossary.len(),
        "Extracted markers"
    );

    let next = state.apply(extracted.into_delta(now));
    store
        .upsert_session(session_id, &next.to_json()?)
        .await
        .context("upsert_session", session_id)?;

    Ok(next)
}
