pub mod chat;
pub mod compile;
pub mod config_cmd;
pub mod ingest;
pub mod serve;
pub mod state;

use mnemo_config::AppConfig;
use mnemo_runtime::{Compiler, Runtime, Session};
use mnemo_store::SqliteStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Global flags shared by every command.
pub struct Context {
    pub config_path: Option<PathBuf>,
    pub db: Option<String>,
    pub session: Option<String>,
}

impl Context {
    /// Config file, then env, then command-line flags.
    pub fn load_config(&self) -> Result<AppConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config_path {
            Some(path) => AppConfig::load_with_env(path),
            None => AppConfig::load(),
        }
        .map_err(|e| format!("Failed to load config: {e}"))?;

        if let Some(db) = &self.db {
            config.storage.path = db.clone();
        }
        if let Some(session) = &self.session {
            config.session.default_id = session.clone();
        }
        Ok(config)
    }

    /// Open the configured store behind a runtime.
    pub async fn runtime(
        &self,
        config: &AppConfig,
        compiler: Compiler,
    ) -> Result<Runtime, Box<dyn std::error::Error>> {
        let store = SqliteStore::new(&config.storage.path)
            .await
            .map_err(|e| format!("Failed to open {}: {e}", config.storage.path))?;
        Ok(Runtime::with_compiler(Arc::new(store), compiler))
    }

    /// Load config, open the store, and get or create the session.
    pub async fn session(&self) -> Result<(AppConfig, Session), Box<dyn std::error::Error>> {
        let config = self.load_config()?;
        let compiler = Compiler::from_config(&config.compiler)?;
        let runtime = self.runtime(&config, compiler).await?;
        let session = runtime.session(&config.session.default_id).await?;
        debug!(session_id = session.id(), storage = %config.storage.path, "Opened session");
        Ok((config, session))
    }
}

/// `[session] repo_path`, else the working directory.
pub fn repo_path(config: &AppConfig, flag: Option<String>) -> String {
    flag.or_else(|| config.session.repo_path.clone())
        .unwrap_or_else(|| {
            std::env::current_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| ".".into())
        })
}
