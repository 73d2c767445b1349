//! `mnemo ingest`, `mnemo snippet`, `mnemo diff` — Feed the session.

use super::Context;
use mnemo_core::EventType;
use mnemo_runtime::SnippetRequest;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Flags for `mnemo ingest`.
pub struct IngestInput {
    pub payload: Option<String>,
    pub content: Option<String>,
    pub file: Option<PathBuf>,
    pub source: Option<String>,
    pub pinned: bool,
}

/// Merge `--payload` with the convenience flags. Flags win.
fn build_payload(input: IngestInput) -> Result<Value, Box<dyn std::error::Error>> {
    let mut payload = match input.payload.as_deref() {
        Some(raw) => match serde_json::from_str(raw)? {
            Value::Object(map) => map,
            _ => return Err("--payload must be a JSON object".into()),
        },
        None => Map::new(),
    };

    if let Some(file) = &input.file {
        let content = std::fs::read_to_string(file)
            .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
        payload.insert("content".into(), content.into());
        payload
            .entry("source")
            .or_insert_with(|| file.display().to_string().into());
    }
    if let Some(content) = input.content {
        payload.insert("content".into(), content.into());
    }
    if let Some(source) = input.source {
        payload.insert("source".into(), source.into());
    }
    if input.pinned {
        payload.insert("pinned".into(), true.into());
    }

    Ok(Value::Object(payload))
}

pub async fn run(
    ctx: &Context,
    event_type: &str,
    input: IngestInput,
) -> Result<(), Box<dyn std::error::Error>> {
    let event_type: EventType = event_type.parse()?;
    let payload = build_payload(input)?;
    let (_, session) = ctx.session().await?;

    let outcome = session.ingest(event_type, &payload).await?;
    match outcome.artifact_id {
        Some(id) => println!("Recorded event #{} with artifact {id}", outcome.seq),
        None => println!("Recorded event #{}", outcome.seq),
    }
    Ok(())
}

pub async fn snippet(
    ctx: &Context,
    path: String,
    start: usize,
    end: Option<usize>,
    pinned: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_, session) = ctx.session().await?;
    let request = SnippetRequest::new(path, start, end.unwrap_or(usize::MAX)).pinned(pinned);

    let id = session.ingest_snippet(&request).await?;
    println!("Ingested snippet: {id}");
    Ok(())
}

pub async fn diff(ctx: &Context, repo: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let (config, session) = ctx.session().await?;
    let repo = super::repo_path(&config, repo);

    match session.ingest_git_diff(&repo).await? {
        Some(id) => println!("Ingested git diff: {id}"),
        None => println!("No git changes to ingest in {repo}"),
    }
    Ok(())
}
