//! Immutable, content-addressed evidence units.
//!
//! A new version of the same source is a new artifact with a new id and a
//! new version hash; stored artifacts are never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The kinds of evidence an artifact can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    RepoDiff,
    Snippet,
    DocChunk,
    ToolOutput,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::RepoDiff => "repo_diff",
            ArtifactKind::Snippet => "snippet",
            ArtifactKind::DocChunk => "doc_chunk",
            ArtifactKind::ToolOutput => "tool_output",
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "repo_diff" => Ok(ArtifactKind::RepoDiff),
            "snippet" => Ok(ArtifactKind::Snippet),
            "doc_chunk" => Ok(ArtifactKind::DocChunk),
            "tool_output" => Ok(ArtifactKind::ToolOutput),
            other => Err(format!("unknown artifact kind '{other}'")),
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Unique artifact id
    pub artifact_id: String,

    pub session_id: String,

    pub kind: ArtifactKind,

    /// Path or identifier the content came from
    pub source: String,

    /// Content fingerprint
    pub version_hash: String,

    pub content: String,

    /// Free-form metadata (e.g. `path`, `startLine`, `endLine`)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub meta: serde_json::Map<String, serde_json::Value>,

    /// Pinned artifacts are truncated, never dropped, by the compiler
    #[serde(default)]
    pub pinned: bool,

    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// The display path: `meta.path` when present, otherwise `source`.
    pub fn path(&self) -> &str {
        self.meta
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.source)
    }
}

/// The fields a caller supplies when storing an artifact.
/// The store assigns the id, session and timestamp.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub kind: ArtifactKind,
    pub source: String,
    pub version_hash: String,
    pub content: String,
    pub meta: serde_json::Map<String, serde_json::Value>,
    pub pinned: bool,
}

impl NewArtifact {
    pub fn new(
        kind: ArtifactKind,
        source: impl Into<String>,
        version_hash: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            source: source.into(),
            version_hash: version_hash.into(),
            content: content.into(),
            meta: serde_json::Map::new(),
            pinned: false,
        }
    }

    pub fn with_meta(mut self, meta: serde_json::Map<String, serde_json::Value>) -> Self {
        self.meta = meta;
        self
    }

    pub fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }
}
