//! Best-effort git diff ingestion.
//!
//! A missing git binary, a non-repository path, or an oversized diff means
//! "nothing to record", not an error. Store failures still propagate.

use super::{content_hash, record_event};
use chrono::Utc;
use mnemo_core::{ArtifactKind, EventType, NewArtifact, Result, Store, StoreResultExt};
use serde_json::json;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Diffs larger than this are skipped.
pub const MAX_DIFF_BYTES: usize = 10 * 1024 * 1024;

/// Run `git diff HEAD` in `repo_path`. `None` when there is nothing usable.
pub async fn collect_git_diff(repo_path: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["diff", "HEAD"])
        .current_dir(repo_path)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await;

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            warn!(repo = %repo_path.display(), error = %e, "Could not run git");
            return None;
        }
    };

    if !output.status.success() {
        debug!(
            repo = %repo_path.display(),
            exit_code = output.status.code().unwrap_or(-1),
            "git diff failed"
        );
        return None;
    }

    if output.stdout.len() > MAX_DIFF_BYTES {
        warn!(
            repo = %repo_path.display(),
            bytes = output.stdout.len(),
            "Diff exceeds size limit, skipping"
        );
        return None;
    }

    let diff = String::from_utf8_lossy(&output.stdout).into_owned();
    if diff.trim().is_empty() {
        return None;
    }
    Some(diff)
}

/// Store the working-tree diff of `repo_path` as a `repo_diff` artifact and
/// event. `Ok(None)` when there were no changes or git was unavailable.
pub async fn ingest_git_diff(
    store: &dyn Store,
    session_id: &str,
    repo_path: &str,
) -> Result<Option<String>> {
    let Some(diff) = collect_git_diff(Path::new(repo_path)).await else {
        return Ok(None);
    };
    let version_hash = content_hash(&diff);

    let meta = json!({ "timestamp": Utc::now().to_rfc3339() });
    let artifact = NewArtifact::new(ArtifactKind::RepoDiff, repo_path, version_hash.clone(), diff)
        .with_meta(meta.as_object().cloned().unwrap_or_default());

    let artifact_id = store
        .put_artifact(session_id, artifact)
        .await
        .context("put_artifact", session_id)?;

    record_event(
        store,
        session_id,
        EventType::RepoDiff,
        &json!({
            "artifactId": artifact_id,
            "repoPath": repo_path,
            "versionHash": version_hash,
        }),
    )
    .await?;

    debug!(session_id, %artifact_id, repo = repo_path, "Ingested git diff");
    Ok(Some(artifact_id))
}
