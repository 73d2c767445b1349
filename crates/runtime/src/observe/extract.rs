//! Conservative marker extraction from assistant text.
//!
//! A line counts only if, after trimming, it starts with one of the exact
//! markers below. No multi-line bodies, no fuzzy matching.

use chrono::{DateTime, Utc};
use mnemo_core::{Decision, GlossaryEntry, OpenThread, StateDelta};

pub const DECISION_MARKER: &str = "Decision:";
pub const CONSTRAINT_MARKER: &str = "Constraint:";
pub const OPEN_MARKER: &str = "Open:";
pub const GLOSSARY_MARKER: &str = "Glossary:";

/// Separates a glossary term from its definition.
pub const GLOSSARY_SEPARATOR: &str = " - ";

/// A policy preamble that teaches a model the markers above.
pub const MARKER_PROMPT: &str = "You are a helpful coding assistant with access to repository context.

When you make decisions or identify constraints, use these markers:
- Decision: <your decision>
- Constraint: <identified constraint>
- Open: <open question>
- Glossary: term - definition

These will be extracted and tracked across the conversation.";

/// Marker bodies found in one piece of text, in line order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub decisions: Vec<String>,
    pub constraints: Vec<String>,
    pub open_threads: Vec<String>,
    pub glossary: Vec<GlossaryEntry>,
}

impl Extracted {
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
            && self.constraints.is_empty()
            && self.open_threads.is_empty()
            && self.glossary.is_empty()
    }

    /// Give decisions and open threads their identities.
    pub fn into_delta(self, now: DateTime<Utc>) -> StateDelta {
        StateDelta {
            constraints: self.constraints,
            decisions: self
                .decisions
                .into_iter()
                .map(|text| Decision::new(text, now))
                .collect(),
            open_threads: self
                .open_threads
                .into_iter()
                .map(|q| OpenThread::new(q, now))
                .collect(),
            glossary: self.glossary,
        }
    }
}

/// Scan `text` line by line for markers.
pub fn extract_markers(text: &str) -> Extracted {
    let mut out = Extracted::default();

    for line in text.lines() {
        let line = line.trim();

        if let Some(body) = marker_body(line, DECISION_MARKER) {
            out.decisions.push(body.to_string());
        } else if let Some(body) = marker_body(line, CONSTRAINT_MARKER) {
            out.constraints.push(body.to_string());
        } else if let Some(body) = marker_body(line, OPEN_MARKER) {
            out.open_threads.push(body.to_string());
        } else if let Some(body) = marker_body(line, GLOSSARY_MARKER)
            && let Some((term, definition)) = body.split_once(GLOSSARY_SEPARATOR)
        {
            let (term, definition) = (term.trim(), definition.trim());
            if !term.is_empty() && !definition.is_empty() {
                out.glossary.push(GlossaryEntry::new(term, definition));
            }
        }
    }

    out
}

/// The trimmed text after `marker`, if the line starts with it and the
/// remainder is non-empty.
fn marker_body<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.strip_prefix(marker)
        .map(str::trim)
        .filter(|body| !body.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_all_four_markers() {
        let text = "Decision: use caching\nConstraint: must be backward compatible\nOpen: add tests?\nGlossary: MVP - Minimum Viable Product";
        let out = extract_markers(text);
        assert_eq!(out.decisions, vec!["use caching"]);
        assert_eq!(out.constraints, vec!["must be backward compatible"]);
        assert_eq!(out.open_threads, vec!["add tests?"]);
        assert_eq!(
            out.glossary,
            vec![GlossaryEntry::new("MVP", "Minimum Viable Product")]
        );
    }

    #[test]
    fn markers_must_start_the_trimmed_line() {
        let text = "  Decision: indented is fine\nWe made a Decision: not this\n- Constraint: nor this\ndecision: wrong case";
        let out = extract_markers(text);
        assert_eq!(out.decisions, vec!["indented is fine"]);
        assert!(out.constraints.is_empty());
    }

    #[test]
    fn empty_bodies_are_skipped() {
        let out = extract_markers("Decision:\nConstraint:   \nOpen:\nGlossary: - nothing\nGlossary: term -   ");
        assert!(out.is_empty());
    }

    #[test]
    fn glossary_needs_spaced_dash() {
        let out = extract_markers("Glossary: WAL-Write Ahead Log\nGlossary: CRDT - Conflict-free - replicated type");
        assert_eq!(
            out.glossary,
            vec![GlossaryEntry::new("CRDT", "Conflict-free - replicated type")]
        );
    }

    #[test]
    fn handles_crlf_line_endings() {
        let out = extract_markers("Decision: a\r\nOpen: b\r\n");
        assert_eq!(out.decisions, vec!["a"]);
        assert_eq!(out.open_threads, vec!["b"]);
    }

    #[test]
    fn into_delta_assigns_fresh_ids() {
        let delta = extract_markers("Decision: x\nDecision: x").into_delta(Utc::now());
        assert_eq!(delta.decisions.len(), 2);
        assert_ne!(delta.decisions[0].id, delta.decisions[1].id);
    }

    #[test]
    fn marker_prompt_mentions_every_marker() {
        for marker in [DECISION_MARKER, CONSTRAINT_MARKER, OPEN_MARKER, GLOSSARY_MARKER] {
            assert!(MARKER_PROMPT.contains(marker));
        }
    }
}
