//! `mnemo chat` — Interactive REPL or single-message turn.

use super::Context;
use mnemo_core::SessionState;
use mnemo_runtime::observe::MARKER_PROMPT;
use mnemo_runtime::{Compiler, TurnOptions, TurnOutcome, run_turn};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    ctx: &Context,
    message: Option<String>,
    budget: Option<usize>,
    auto_diff: bool,
    repo: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ctx.load_config()?;

    // Chat always asks the model for markers unless a prefix is configured.
    let mut compiler = Compiler::from_config(&config.compiler)?;
    if compiler.stable_prefix().is_none() {
        compiler = compiler.with_stable_prefix(MARKER_PROMPT);
    }
    let runtime = ctx.runtime(&config, compiler).await?;
    let session = runtime.session(&config.session.default_id).await?;
    let model = mnemo_providers::build_from_config(&config.model)?;

    let budget = budget.unwrap_or(config.compiler.default_budget_tokens);
    let repo = super::repo_path(&config, repo);
    let mut options = TurnOptions::new(budget);
    if auto_diff || config.session.auto_diff {
        options = options.with_auto_diff(repo.clone());
    }

    if let Some(msg) = message {
        let outcome = run_turn(&session, model.as_ref(), &msg, &options).await?;
        println!("{}", outcome.reply);
        return Ok(());
    }

    println!();
    println!("  mnemo — interactive chat");
    println!();
    println!("  Session:   {}", session.id());
    println!("  Storage:   {}", config.storage.path);
    println!("  Model:     {} ({})", model.name(), config.model.model);
    println!("  Budget:    {budget} tokens");
    println!("  Repo:      {repo}");
    println!();
    println!("  Commands:");
    println!("    /diff   Ingest git diff from repo");
    println!("    /state  Show current session state");
    println!("    /exit   Exit");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => {}
            "/exit" | "/quit" | "exit" | "quit" => break,
            "/state" => print_state(&session.state().await?)?,
            "/diff" => match session.ingest_git_diff(&repo).await {
                Ok(Some(id)) => println!("  Ingested git diff: {id}"),
                Ok(None) => println!("  No git changes to ingest"),
                Err(e) => eprintln!("  [Error] {e}"),
            },
            _ => match run_turn(&session, model.as_ref(), input, &options).await {
                Ok(outcome) => print_turn(&outcome, budget),
                Err(e) => eprintln!("  [Error] {e}"),
            },
        }
        prompt()?;
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("\n  You > ");
    std::io::stdout().flush()
}

fn print_state(state: &SessionState) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("{}", serde_json::to_string_pretty(state)?);
    Ok(())
}

fn print_turn(outcome: &TurnOutcome, budget: usize) {
    let debug = &outcome.debug;
    if let Some(id) = &outcome.diff_artifact {
        println!("  Auto-ingested git diff: {}", short_id(id));
    }
    println!();
    println!("  Tokens:    {} / {budget}", debug.token_estimate);
    println!(
        "  Artifacts: {} included, {} dropped",
        debug.included_artifacts.len(),
        debug.dropped_artifacts.len()
    );
    println!();
    for line in outcome.reply.lines() {
        println!("  Assistant > {line}");
    }

    let state = &outcome.state;
    println!();
    if !state.decisions.is_empty() {
        println!("  Decisions tracked:   {}", state.decisions.len());
    }
    if !state.constraints.is_empty() {
        println!("  Constraints tracked: {}", state.constraints.len());
    }
    if !state.open_threads.is_empty() {
        println!("  Open threads:        {}", state.open_threads.len());
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_runtime::Session;

    async fn turn(session: &Session, message: &str) -> mnemo_core::Result<TurnOutcome> {
        let model = mnemo_providers::StubModel::new();
        run_turn(session, &model, message, &TurnOptions::new(4000)).await
    }

    #[test]
    fn short_ids() {
        assert_eq!(short_id("0123456789"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }

    #[tokio::test]
    async fn stub_turn_accumulates_state() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context {
            config_path: Some(dir.path().join("none.toml")),
            db: Some(dir.path().join("chat.sqlite").display().to_string()),
            session: Some("chat".into()),
        };
        let (_, session) = ctx.session().await.unwrap();

        turn(&session, "abc").await.unwrap();
        let outcome = turn(&session, "abcd").await.unwrap();

        assert_eq!(outcome.state.decisions.len(), 2);
        assert_eq!(outcome.state.glossary[0].term, "MVP");
    }
}
