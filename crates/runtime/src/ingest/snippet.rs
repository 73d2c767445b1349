//! Code snippet ingestion.

use super::{content_hash, record_event};
use chrono::Utc;
use mnemo_core::{ArtifactKind, EventType, NewArtifact, Result, Store, StoreResultExt};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// A line range of a file, optionally with its text already in hand.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetRequest {
    pub path: String,
    /// 1-based, inclusive
    pub start_line: usize,
    /// 1-based, inclusive
    pub end_line: usize,
    /// Read from `path` when absent or empty.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub pinned: bool,
}

impl SnippetRequest {
    pub fn new(path: impl Into<String>, start_line: usize, end_line: usize) -> Self {
        Self {
            path: path.into(),
            start_line,
            end_line,
            text: None,
            pinned: false,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }
}

/// Lines `start..=end` (1-based) of `text`. Out-of-range parts are clipped.
pub fn slice_lines(text: &str, start_line: usize, end_line: usize) -> String {
    let skip = start_line.saturating_sub(1);
    let take = end_line.saturating_sub(skip);
    text.split('\n')
        .skip(skip)
        .take(take)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Store a snippet artifact plus a `snippet` event pointing at it.
///
/// Returns the artifact id.
pub async fn ingest_snippet(
    store: &dyn Store,
    session_id: &str,
    request: &SnippetRequest,
) -> Result<String> {
    let content = match request.text.as_deref().filter(|t| !t.is_empty()) {
        Some(text) => text.to_string(),
        None => {
            let full = tokio::fs::read_to_string(&request.path).await?;
            slice_lines(&full, request.start_line, request.end_line)
        }
    };
    let version_hash = content_hash(&content);

    let meta = json!({
        "path": request.path,
        "startLine": request.start_line,
        "endLine": request.end_line,
        "timestamp": Utc::now().to_rfc3339(),
    });
    let artifact = NewArtifact::new(
        ArtifactKind::Snippet,
        request.path.clone(),
        version_hash.clone(),
        content,
    )
    .with_meta(meta.as_object().cloned().unwrap_or_default())
    .pinned(request.pinned);

    let artifact_id = store
        .put_artifact(session_id, artifact)
        .await
        .context("put_artifact", session_id)?;

    record_event(
        store,
        session_id,
        EventType::Snippet,
        &json!({
            "artifactId": artifact_id,
            "path": request.path,
            "startLine": request.start_line,
            "endLine": request.end_line,
            "versionHash": version_hash,
        }),
    )
    .await?;

    debug!(session_id, %artifact_id, path = %request.path, pinned = request.pinned, "Ingested snippet");
    Ok(artifact_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_store::InMemoryStore;
    use std::io::Write;

    #[test]
    fn slices_inclusive_one_based_ranges() {
        let text = "one\ntwo\nthree\nfour";
        assert_eq!(slice_lines(text, 2, 3), "two\nthree");
        assert_eq!(slice_lines(text, 1, 1), "one");
        assert_eq!(slice_lines(text, 3, 99), "three\nfour");
        assert_eq!(slice_lines(text, 0, 2), "one\ntwo");
        assert_eq!(slice_lines(text, 5, 9), "");
        assert_eq!(slice_lines(text, 3, 2), "");
    }

    #[tokio::test]
    async fn reads_lines_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "fn a() {{}}\nfn b() {{}}\nfn c() {{}}\n").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let store = InMemoryStore::new();
        store.upsert_session("s", "{}").await.unwrap();
        let id = ingest_snippet(&store, "s", &SnippetRequest::new(&path, 2, 3))
            .await
            .unwrap();

        let artifacts = store.list_recent_artifacts("s", &[], 1).await.unwrap();
        let a = &artifacts[0];
        assert_eq!(a.artifact_id, id);
        assert_eq!(a.content, "fn b() {}\nfn c() {}");
        assert_eq!(a.meta["startLine"], 2);
        assert_eq!(a.meta["endLine"], 3);
        assert_eq!(a.version_hash, content_hash("fn b() {}\nfn c() {}"));

        let events = store
            .list_recent_events("s", &[EventType::Snippet], 1)
            .await
            .unwrap();
        assert_eq!(events[0].payload["artifactId"], id.as_str());
    }

    #[tokio::test]
    async fn inline_text_skips_the_filesystem() {
        let store = InMemoryStore::new();
        store.upsert_session("s", "{}").await.unwrap();
        ingest_snippet(
            &store,
            "s",
            &SnippetRequest::new("does/not/exist.rs", 1, 1)
                .with_text("pub fn x() {}")
                .pinned(true),
        )
        .await
        .unwrap();

        let a = &store.list_recent_artifacts("s", &[], 1).await.unwrap()[0];
        assert!(a.pinned);
        assert_eq!(a.path(), "does/not/exist.rs");
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let store = InMemoryStore::new();
        store.upsert_session("s", "{}").await.unwrap();
        let err = ingest_snippet(&store, "s", &SnippetRequest::new("/no/such/file.rs", 1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, mnemo_core::Error::Io(_)));
    }
}
