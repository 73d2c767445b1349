//! Evidence selection: rule-based, deterministic ranking of artifacts.
//!
//! Candidates come from four tiers, evaluated in this fixed order:
//!
//! | Tier | Lookback | Priority |
//! |------|----------|----------|
//! | repo diffs | `diff_window` | `diff_priority` (100) |
//! | snippets | `snippet_window` | 50, working set 80, keyword ≥ 70, pinned 95 |
//! | pinned snippets outside the snippet window | `pinned_window` | `pinned_priority` (95) |
//! | doc chunks, tool outputs | `other_window` | `other_priority` (40) |
//!
//! The list is then re-sorted by priority (descending), ties broken by
//! artifact creation time (newest first). Each artifact appears at most once;
//! the first tier that claims it wins.
//!
//! All store reads happen in [`EvidenceWindows::load`]; ranking itself is a
//! pure function so the same windows always produce the same order.

use mnemo_config::SelectionOverrides;
use mnemo_core::{Artifact, ArtifactKind, Error, Result, SessionState, Store, StoreResultExt};
use serde::Serialize;
use std::collections::HashSet;

// ── Policy ────────────────────────────────────────────────────────────────

pub const DEFAULT_DIFF_WINDOW: usize = 5;
pub const DEFAULT_SNIPPET_WINDOW: usize = 20;
pub const DEFAULT_PINNED_WINDOW: usize = 100;
pub const DEFAULT_OTHER_WINDOW: usize = 10;

pub const DEFAULT_DIFF_PRIORITY: i32 = 100;
pub const DEFAULT_PINNED_PRIORITY: i32 = 95;
pub const DEFAULT_WORKING_SET_PRIORITY: i32 = 80;
pub const DEFAULT_KEYWORD_PRIORITY: i32 = 70;
pub const DEFAULT_SNIPPET_PRIORITY: i32 = 50;
pub const DEFAULT_OTHER_PRIORITY: i32 = 40;

/// Path segments this short never count as a keyword hit.
pub const MIN_KEYWORD_SEGMENT_CHARS: usize = 3;

/// Lookback windows and tier priorities used by the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub diff_window: usize,
    pub snippet_window: usize,
    pub pinned_window: usize,
    pub other_window: usize,
    pub diff_priority: i32,
    pub pinned_priority: i32,
    pub working_set_priority: i32,
    pub keyword_priority: i32,
    pub snippet_priority: i32,
    pub other_priority: i32,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            diff_window: DEFAULT_DIFF_WINDOW,
            snippet_window: DEFAULT_SNIPPET_WINDOW,
            pinned_window: DEFAULT_PINNED_WINDOW,
            other_window: DEFAULT_OTHER_WINDOW,
            diff_priority: DEFAULT_DIFF_PRIORITY,
            pinned_priority: DEFAULT_PINNED_PRIORITY,
            working_set_priority: DEFAULT_WORKING_SET_PRIORITY,
            keyword_priority: DEFAULT_KEYWORD_PRIORITY,
            snippet_priority: DEFAULT_SNIPPET_PRIORITY,
            other_priority: DEFAULT_OTHER_PRIORITY,
        }
    }
}

impl SelectionPolicy {
    /// Apply configured overrides on top of the defaults.
    pub fn from_overrides(o: &SelectionOverrides) -> Result<Self> {
        let d = Self::default();
        let policy = Self {
            diff_window: o.diff_window.unwrap_or(d.diff_window),
            snippet_window: o.snippet_window.unwrap_or(d.snippet_window),
            pinned_window: o.pinned_window.unwrap_or(d.pinned_window),
            other_window: o.other_window.unwrap_or(d.other_window),
            diff_priority: o.diff_priority.unwrap_or(d.diff_priority),
            pinned_priority: o.pinned_priority.unwrap_or(d.pinned_priority),
            working_set_priority: o.working_set_priority.unwrap_or(d.working_set_priority),
            keyword_priority: o.keyword_priority.unwrap_or(d.keyword_priority),
            snippet_priority: o.snippet_priority.unwrap_or(d.snippet_priority),
            other_priority: o.other_priority.unwrap_or(d.other_priority),
        };

        if policy.pinned_window < policy.snippet_window {
            return Err(Error::Config {
                message: format!(
                    "pinned_window ({}) must be >= snippet_window ({})",
                    policy.pinned_window, policy.snippet_window
                ),
            });
        }
        Ok(policy)
    }

    /// The highest priority any tier can assign.
    pub fn max_priority(&self) -> i32 {
        [
            self.diff_priority,
            self.pinned_priority,
            self.working_set_priority,
            self.keyword_priority,
            self.snippet_priority,
            self.other_priority,
        ]
        .into_iter()
        .max()
        .unwrap_or(self.diff_priority)
    }
}

// ── Types ─────────────────────────────────────────────────────────────────

/// One ranked candidate for inclusion in compiled context.
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceItem {
    pub artifact: Artifact,
    pub priority: i32,
    /// Which rule produced the priority.
    pub rationale: String,
}

/// The raw artifact windows ranking works from, newest first in each.
#[derive(Debug, Clone, Default)]
pub struct EvidenceWindows {
    pub diffs: Vec<Artifact>,
    pub snippets: Vec<Artifact>,
    /// The wider snippet lookback scanned for pinned items.
    pub pinned_scan: Vec<Artifact>,
    pub others: Vec<Artifact>,
}

impl EvidenceWindows {
    /// Read every window the selector needs, up front.
    pub async fn load(
        store: &dyn Store,
        session_id: &str,
        policy: &SelectionPolicy,
    ) -> Result<Self> {
        let diffs = store
            .list_recent_artifacts(session_id, &[ArtifactKind::RepoDiff], policy.diff_window)
            .await
            .context("list_recent_artifacts", session_id)?;
        let snippets = store
            .list_recent_artifacts(session_id, &[ArtifactKind::Snippet], policy.snippet_window)
            .await
            .context("list_recent_artifacts", session_id)?;
        let pinned_scan = store
            .list_recent_artifacts(session_id, &[ArtifactKind::Snippet], policy.pinned_window)
            .await
            .context("list_recent_artifacts", session_id)?;
        let others = store
            .list_recent_artifacts(
                session_id,
                &[ArtifactKind::DocChunk, ArtifactKind::ToolOutput],
                policy.other_window,
            )
            .await
            .context("list_recent_artifacts", session_id)?;

        Ok(Self {
            diffs,
            snippets,
            pinned_scan,
            others,
        })
    }
}

// ── Ranking ───────────────────────────────────────────────────────────────

/// Load windows from the store and rank them.
pub async fn select_evidence(
    store: &dyn Store,
    session_id: &str,
    user_message: &str,
    state: &SessionState,
    policy: &SelectionPolicy,
) -> Result<Vec<EvidenceItem>> {
    let windows = EvidenceWindows::load(store, session_id, policy).await?;
    Ok(rank_evidence(windows, user_message, state, policy))
}

/// Rank pre-loaded windows into the final candidate order.
pub fn rank_evidence(
    windows: EvidenceWindows,
    user_message: &str,
    state: &SessionState,
    policy: &SelectionPolicy,
) -> Vec<EvidenceItem> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut evidence: Vec<EvidenceItem> = Vec::new();
    let message_lower = user_message.to_lowercase();
    let working_set = state.working_set_paths();

    // Tier 1: repo diffs
    for artifact in windows.diffs {
        if seen.insert(artifact.artifact_id.clone()) {
            evidence.push(EvidenceItem {
                artifact,
                priority: policy.diff_priority,
                rationale: "Recent repository changes".into(),
            });
        }
    }

    // Tier 2: recent snippets with boosts
    for artifact in windows.snippets {
        if !seen.insert(artifact.artifact_id.clone()) {
            continue;
        }
        let (priority, rationale) = score_snippet(&artifact, &message_lower, working_set, policy);
        evidence.push(EvidenceItem {
            artifact,
            priority,
            rationale,
        });
    }

    // Tier 3: pinned snippets the recency window missed
    for artifact in windows.pinned_scan {
        if artifact.pinned && seen.insert(artifact.artifact_id.clone()) {
            evidence.push(EvidenceItem {
                artifact,
                priority: policy.pinned_priority,
                rationale: PINNED_RATIONALE.into(),
            });
        }
    }

    // Tier 4: everything else
    for artifact in windows.others {
        if seen.insert(artifact.artifact_id.clone()) {
            let rationale = format!("{} artifact", artifact.kind);
            evidence.push(EvidenceItem {
                artifact,
                priority: policy.other_priority,
                rationale,
            });
        }
    }

    // Stable: equal priority and timestamp keep tier order.
    evidence.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.artifact.created_at.cmp(&a.artifact.created_at))
    });
    evidence
}

const PINNED_RATIONALE: &str = "Pinned artifact - never drop";

fn score_snippet(
    artifact: &Artifact,
    message_lower: &str,
    working_set: &[String],
    policy: &SelectionPolicy,
) -> (i32, String) {
    if artifact.pinned {
        return (policy.pinned_priority, PINNED_RATIONALE.into());
    }

    let path = artifact.path();
    let in_working_set = working_set
        .iter()
        .filter(|ws| !ws.is_empty())
        .any(|ws| path.contains(ws.as_str()));
    let keyword_hit = path_matches_message(path, message_lower);

    match (in_working_set, keyword_hit) {
        (true, true) => (
            policy.working_set_priority.max(policy.keyword_priority),
            "Snippet in working set, matches user message keywords".into(),
        ),
        (true, false) => (policy.working_set_priority, "Snippet in working set".into()),
        (false, true) => (
            policy.snippet_priority.max(policy.keyword_priority),
            "Snippet matches user message keywords".into(),
        ),
        (false, false) => (policy.snippet_priority, "Code snippet".into()),
    }
}

/// True if any `/`-separated path segment of at least
/// [`MIN_KEYWORD_SEGMENT_CHARS`] characters occurs in the message.
fn path_matches_message(path: &str, message_lower: &str) -> bool {
    path.to_lowercase()
        .split('/')
        .filter(|seg| seg.chars().count() >= MIN_KEYWORD_SEGMENT_CHARS)
        .any(|seg| message_lower.contains(seg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use mnemo_core::WorkingSet;

    fn artifact(id: &str, kind: ArtifactKind, source: &str, age_secs: i64) -> Artifact {
        Artifact {
            artifact_id: id.into(),
            session_id: "s".into(),
            kind,
            source: source.into(),
            version_hash: "h".into(),
            content: "content".into(),
            meta: serde_json::Map::new(),
            pinned: false,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
                - Duration::seconds(age_secs),
        }
    }

    fn pinned(mut a: Artifact) -> Artifact {
        a.pinned = true;
        a
    }

    fn ids(items: &[EvidenceItem]) -> Vec<&str> {
        items.iter().map(|i| i.artifact.artifact_id.as_str()).collect()
    }

    #[test]
    fn diffs_outrank_everything() {
        let windows = EvidenceWindows {
            diffs: vec![artifact("d1", ArtifactKind::RepoDiff, "/repo", 100)],
            snippets: vec![pinned(artifact("s1", ArtifactKind::Snippet, "a.rs", 1))],
            pinned_scan: vec![],
            others: vec![artifact("o1", ArtifactKind::DocChunk, "README", 0)],
        };
        let ranked = rank_evidence(windows, "", &SessionState::default(), &SelectionPolicy::default());
        assert_eq!(ids(&ranked), vec!["d1", "s1", "o1"]);
        assert_eq!(ranked[0].priority, 100);
        assert_eq!(ranked[0].rationale, "Recent repository changes");
        assert_eq!(ranked[2].rationale, "doc_chunk artifact");
    }

    #[test]
    fn working_set_and_keyword_boosts() {
        let state = SessionState {
            working_set: Some(WorkingSet {
                paths: vec!["src/compile".into()],
            }),
            ..Default::default()
        };
        let windows = EvidenceWindows {
            snippets: vec![
                artifact("plain", ArtifactKind::Snippet, "lib/misc.rs", 0),
                artifact("ws", ArtifactKind::Snippet, "src/compile/budget.rs", 1),
                artifact("kw", ArtifactKind::Snippet, "src/observe/extract.rs", 2),
            ],
            ..Default::default()
        };
        let ranked = rank_evidence(
            windows,
            "How does EXTRACT.RS parse markers?",
            &state,
            &SelectionPolicy::default(),
        );
        assert_eq!(ids(&ranked), vec!["ws", "kw", "plain"]);
        assert_eq!(ranked[0].priority, 80);
        assert_eq!(ranked[0].rationale, "Snippet in working set");
        assert_eq!(ranked[1].priority, 70);
        assert_eq!(ranked[1].rationale, "Snippet matches user message keywords");
        assert_eq!(ranked[2].priority, 50);
        assert_eq!(ranked[2].rationale, "Code snippet");
    }

    #[test]
    fn working_set_match_is_one_way() {
        let state = SessionState {
            working_set: Some(WorkingSet {
                paths: vec!["src/data.rs".into()],
            }),
            ..Default::default()
        };
        let windows = EvidenceWindows {
            snippets: vec![
                artifact("suffix", ArtifactKind::Snippet, "a.rs", 0),
                artifact("empty", ArtifactKind::Snippet, "", 1),
                artifact("full", ArtifactKind::Snippet, "crate/src/data.rs", 2),
            ],
            ..Default::default()
        };
        let ranked = rank_evidence(windows, "", &state, &SelectionPolicy::default());
        assert_eq!(ids(&ranked), vec!["full", "suffix", "empty"]);
        assert_eq!(ranked[0].priority, 80);
        assert_eq!(ranked[1].priority, 50);
        assert_eq!(ranked[1].rationale, "Code snippet");
        assert_eq!(ranked[2].priority, 50);
    }

    #[test]
    fn short_segments_never_match() {
        // "a" and "rs" are too short; "lib.rs" is not in the message
        assert!(!path_matches_message("a/rs/lib.rs", "a rs b"));
        assert!(path_matches_message("src/lib.rs", "look at src please"));
    }

    #[test]
    fn pinned_outside_window_is_recovered_once() {
        let old_pin = pinned(artifact("old-pin", ArtifactKind::Snippet, "core.rs", 1000));
        let recent = artifact("recent", ArtifactKind::Snippet, "a.rs", 0);
        let recent_pin = pinned(artifact("recent-pin", ArtifactKind::Snippet, "b.rs", 5));
        let windows = EvidenceWindows {
            snippets: vec![recent.clone(), recent_pin.clone()],
            pinned_scan: vec![recent, recent_pin, old_pin],
            ..Default::default()
        };
        let ranked = rank_evidence(windows, "", &SessionState::default(), &SelectionPolicy::default());
        assert_eq!(ids(&ranked), vec!["recent-pin", "old-pin", "recent"]);
        assert!(ranked[..2].iter().all(|i| i.priority == 95));
        assert_eq!(ranked[1].rationale, "Pinned artifact - never drop");
    }

    #[test]
    fn ties_break_by_recency() {
        let windows = EvidenceWindows {
            others: vec![
                artifact("older", ArtifactKind::ToolOutput, "t", 50),
                artifact("newer", ArtifactKind::DocChunk, "d", 10),
            ],
            ..Default::default()
        };
        let ranked = rank_evidence(windows, "", &SessionState::default(), &SelectionPolicy::default());
        assert_eq!(ids(&ranked), vec!["newer", "older"]);
    }

    #[test]
    fn ranking_is_deterministic() {
        let build = || EvidenceWindows {
            diffs: vec![artifact("d", ArtifactKind::RepoDiff, "/r", 0)],
            snippets: (0..10)
                .map(|i| artifact(&format!("s{i}"), ArtifactKind::Snippet, "x.rs", 0))
                .collect(),
            ..Default::default()
        };
        let policy = SelectionPolicy::default();
        let a = rank_evidence(build(), "x.rs", &SessionState::default(), &policy);
        let b = rank_evidence(build(), "x.rs", &SessionState::default(), &policy);
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn overrides_apply_and_validate() {
        let policy = SelectionPolicy::from_overrides(&SelectionOverrides {
            snippet_window: Some(30),
            other_priority: Some(10),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(policy.snippet_window, 30);
        assert_eq!(policy.other_priority, 10);
        assert_eq!(policy.diff_window, DEFAULT_DIFF_WINDOW);

        let err = SelectionPolicy::from_overrides(&SelectionOverrides {
            pinned_window: Some(5),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
