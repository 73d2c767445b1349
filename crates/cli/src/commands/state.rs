//! `mnemo observe`, `mnemo state`, `mnemo events` — Session state and log.

use super::Context;
use mnemo_core::{EventType, StoredEvent};
use tokio::io::AsyncReadExt;

pub async fn observe(ctx: &Context, text: String) -> Result<(), Box<dyn std::error::Error>> {
    let text = if text == "-" {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        text
    };

    let (_, session) = ctx.session().await?;
    let before = session.state().await?;
    let after = session.observe(&text).await?;

    println!(
        "Decisions +{}, constraints +{}, open threads +{}, glossary +{}",
        after.decisions.len() - before.decisions.len(),
        after.constraints.len() - before.constraints.len(),
        after.open_threads.len() - before.open_threads.len(),
        after.glossary.len() - before.glossary.len(),
    );
    Ok(())
}

pub async fn show(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (_, session) = ctx.session().await?;
    let record = session.record().await?;
    let state = session.state().await?;

    println!("Session: {} (version {})", record.session_id, record.version);
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

pub async fn events(
    ctx: &Context,
    types: Vec<String>,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let types = types
        .iter()
        .map(|t| t.parse::<EventType>())
        .collect::<Result<Vec<_>, _>>()?;

    let (_, session) = ctx.session().await?;
    for event in session.events(&types, limit).await? {
        println!("{}", summarize(&event));
    }
    Ok(())
}

const PREVIEW_CHARS: usize = 60;

fn summarize(event: &StoredEvent) -> String {
    let preview = ["text", "content", "artifactId", "path", "repoPath"]
        .iter()
        .find_map(|key| event.payload.get(*key).and_then(|v| v.as_str()))
        .unwrap_or("");
    let preview: String = preview
        .chars()
        .take(PREVIEW_CHARS)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();

    format!(
        "#{:<5} {}  {:<18} {}",
        event.seq,
        event.created_at.format("%Y-%m-%d %H:%M:%S"),
        event.event_type.as_str(),
        preview
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn event(seq: i64, event_type: EventType, payload: Value) -> StoredEvent {
        StoredEvent {
            seq,
            session_id: "s".into(),
            event_type,
            payload,
            created_at: "2026-01-02T03:04:05Z".parse().unwrap(),
        }
    }

    #[test]
    fn summary_prefers_text_and_flattens_newlines() {
        let line = summarize(&event(
            7,
            EventType::UserMessage,
            json!({"text": "line one\nline two"}),
        ));
        assert!(line.starts_with("#7"));
        assert!(line.contains("2026-01-02 03:04:05"));
        assert!(line.contains("user_message"));
        assert!(line.ends_with("line one line two"));
    }

    #[test]
    fn summary_falls_back_to_artifact_id() {
        let line = summarize(&event(
            1,
            EventType::Snippet,
            json!({"artifactId": "abc-123", "startLine": 1}),
        ));
        assert!(line.ends_with("abc-123"));
    }
}
