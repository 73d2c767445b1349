//! Distilled session state — what the conversation has concluded so far.
//!
//! The state is a single aggregate per session, persisted as JSON with a
//! stable camelCase shape:
//!
//! ```json
//! {
//!   "constraints": ["must be backward compatible"],
//!   "decisions": [{"id": "…", "text": "use caching", "evidenceRefs": [], "createdAt": "…"}],
//!   "openThreads": [{"id": "…", "question": "add tests?", "createdAt": "…"}],
//!   "glossary": [{"term": "MVP", "definition": "Minimum Viable Product"}],
//!   "workingSet": {"paths": ["src/compile"]}
//! }
//! ```
//!
//! Updates go through four pure merge functions, one per collection, so each
//! dedup rule can be tested (and later replaced) on its own:
//!
//! | Collection | Rule |
//! |------------|------|
//! | constraints | set semantics, exact text equality |
//! | decisions | append-only, every decision has a fresh id |
//! | openThreads | append-only, every thread has a fresh id |
//! | glossary | keyed by case-insensitive term, last write wins |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// A recorded decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub evidence_refs: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Decision {
    /// A decision with a fresh identity.
    pub fn new(text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            evidence_refs: Vec::new(),
            created_at,
        }
    }
}

/// An unresolved question carried across turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenThread {
    pub id: String,
    pub question: String,
    pub created_at: DateTime<Utc>,
}

impl OpenThread {
    /// An open thread with a fresh identity.
    pub fn new(question: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            question: question.into(),
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub term: String,
    pub definition: String,
}

impl GlossaryEntry {
    pub fn new(term: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            definition: definition.into(),
        }
    }
}

/// Paths the user is currently working on; matching snippets rank higher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingSet {
    #[serde(default)]
    pub paths: Vec<String>,
}

/// The per-session distilled state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub constraints: Vec<String>,

    #[serde(default)]
    pub decisions: Vec<Decision>,

    #[serde(default)]
    pub open_threads: Vec<OpenThread>,

    #[serde(default)]
    pub glossary: Vec<GlossaryEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_set: Option<WorkingSet>,
}

/// Items distilled from one observation, ready to merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub constraints: Vec<String>,
    pub decisions: Vec<Decision>,
    pub open_threads: Vec<OpenThread>,
    pub glossary: Vec<GlossaryEntry>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
            && self.decisions.is_empty()
            && self.open_threads.is_empty()
            && self.glossary.is_empty()
    }
}

impl SessionState {
    /// Parse a persisted state snapshot.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Compact JSON, as persisted and as measured by the budget allocator.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Working-set paths, empty when no working set is recorded.
    pub fn working_set_paths(&self) -> &[String] {
        self.working_set
            .as_ref()
            .map(|ws| ws.paths.as_slice())
            .unwrap_or(&[])
    }

    /// Merge a delta into this state using the per-collection rules.
    pub fn apply(self, delta: StateDelta) -> Self {
        Self {
            constraints: merge_constraints(self.constraints, delta.constraints),
            decisions: append_decisions(self.decisions, delta.decisions),
            open_threads: append_open_threads(self.open_threads, delta.open_threads),
            glossary: merge_glossary(self.glossary, delta.glossary),
            working_set: self.working_set,
        }
    }
}

/// Add constraints not already present (exact text equality), keeping order.
pub fn merge_constraints(mut existing: Vec<String>, incoming: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = existing.iter().cloned().collect();
    for constraint in incoming {
        if seen.insert(constraint.clone()) {
            existing.push(constraint);
        }
    }
    existing
}

/// Decisions are never deduplicated.
pub fn append_decisions(mut existing: Vec<Decision>, incoming: Vec<Decision>) -> Vec<Decision> {
    existing.extend(incoming);
    existing
}

/// Open threads are never deduplicated.
pub fn append_open_threads(
    mut existing: Vec<OpenThread>,
    incoming: Vec<OpenThread>,
) -> Vec<OpenThread> {
    existing.extend(incoming);
    existing
}

/// Insert or overwrite glossary entries keyed by lower-cased term.
///
/// An existing entry keeps its original spelling and position; only the
/// definition is replaced.
pub fn merge_glossary(
    mut existing: Vec<GlossaryEntry>,
    incoming: Vec<GlossaryEntry>,
) -> Vec<GlossaryEntry> {
    for entry in incoming {
        let key = entry.term.to_lowercase();
        match existing.iter_mut().find(|e| e.term.to_lowercase() == key) {
            Some(current) => current.definition = entry.definition,
            None => existing.push(entry),
        }
    }
    existing
}
