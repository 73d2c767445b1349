//! mnemo CLI — the main entry point.
//!
//! Commands:
//! - `chat`     — Interactive REPL or single-message turn
//! - `ingest`   — Record an event (and its artifact)
//! - `snippet`  — Ingest lines of a file as a snippet
//! - `diff`     — Ingest the working-tree git diff
//! - `compile`  — Print the compiled context for a message
//! - `observe`  — Fold assistant text into session state
//! - `state`    — Show session state
//! - `events`   — List recent events
//! - `serve`    — Start the HTTP gateway
//! - `config`   — Show, locate, or scaffold configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "mnemo",
    about = "mnemo — bounded, deterministic context for LLM chat sessions",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.mnemo/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path, overriding [storage] path
    #[arg(long, global = true)]
    db: Option<String>,

    /// Session id, overriding [session] default_id
    #[arg(short, long, global = true)]
    session: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat through the runtime
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Token budget for each compile
        #[arg(short, long)]
        budget: Option<usize>,

        /// Ingest `git diff HEAD` before every turn
        #[arg(long)]
        auto_diff: bool,

        /// Repository for diff ingestion (default: current directory)
        #[arg(long)]
        repo: Option<String>,
    },

    /// Record an event; artifact-bearing types with content also store an artifact
    Ingest {
        /// user_message, repo_diff, snippet, doc_chunk, tool_output, assistant_response
        event_type: String,

        /// Full payload as a JSON object
        #[arg(long)]
        payload: Option<String>,

        /// Artifact content
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,

        /// Read artifact content from a file (also the default source)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Artifact source label
        #[arg(long)]
        source: Option<String>,

        /// Keep this artifact in every compile
        #[arg(long)]
        pinned: bool,
    },

    /// Ingest a line range of a file as a snippet
    Snippet {
        path: String,

        /// First line, 1-based
        #[arg(long, default_value_t = 1)]
        start: usize,

        /// Last line, inclusive (default: end of file)
        #[arg(long)]
        end: Option<usize>,

        #[arg(long)]
        pinned: bool,
    },

    /// Ingest the working-tree git diff
    Diff {
        /// Repository path (default: [session] repo_path or current directory)
        #[arg(long)]
        repo: Option<String>,
    },

    /// Compile context for a message without calling a model
    Compile {
        message: String,

        #[arg(short, long)]
        budget: Option<usize>,

        /// Policy text placed before the state block
        #[arg(long)]
        prefix: Option<String>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract markers from assistant text into session state
    Observe {
        /// Assistant text; `-` reads stdin
        text: String,
    },

    /// Show session state
    State,

    /// List recent events, newest first
    Events {
        /// Only these event types
        #[arg(short = 't', long = "type")]
        types: Vec<String>,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Print a default config file
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = commands::Context {
        config_path: cli.config,
        db: cli.db,
        session: cli.session,
    };

    match cli.command {
        Commands::Chat {
            message,
            budget,
            auto_diff,
            repo,
        } => commands::chat::run(&ctx, message, budget, auto_diff, repo).await?,
        Commands::Ingest {
            event_type,
            payload,
            content,
            file,
            source,
            pinned,
        } => {
            let input = commands::ingest::IngestInput {
                payload,
                content,
                file,
                source,
                pinned,
            };
            commands::ingest::run(&ctx, &event_type, input).await?
        }
        Commands::Snippet {
            path,
            start,
            end,
            pinned,
        } => commands::ingest::snippet(&ctx, path, start, end, pinned).await?,
        Commands::Diff { repo } => commands::ingest::diff(&ctx, repo).await?,
        Commands::Compile {
            message,
            budget,
            prefix,
            json,
        } => commands::compile::run(&ctx, message, budget, prefix, json).await?,
        Commands::Observe { text } => commands::state::observe(&ctx, text).await?,
        Commands::State => commands::state::show(&ctx).await?,
        Commands::Events { types, limit } => commands::state::events(&ctx, types, limit).await?,
        Commands::Serve { port } => commands::serve::run(&ctx, port).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(&ctx).await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Init => commands::config_cmd::init().await?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["mnemo", "state", "--session", "s1", "--db", "x.db"]).unwrap();
        assert_eq!(cli.session.as_deref(), Some("s1"));
        assert_eq!(cli.db.as_deref(), Some("x.db"));
        assert!(matches!(cli.command, Commands::State));
    }

    #[test]
    fn content_and_file_conflict() {
        let parsed = Cli::try_parse_from([
            "mnemo", "ingest", "doc_chunk", "--content", "x", "--file", "a.md",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn events_accepts_repeated_types() {
        let cli =
            Cli::try_parse_from(["mnemo", "events", "-t", "snippet", "-t", "repo_diff"]).unwrap();
        match cli.command {
            Commands::Events { types, limit } => {
                assert_eq!(types, vec!["snippet", "repo_diff"]);
                assert_eq!(limit, 20);
            }
            _ => panic!("expected events"),
        }
    }
}
