//! Configuration loading, validation, and management for mnemo.
//!
//! Loads configuration from `~/.mnemo/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! Compiler tuning knobs (lookback windows, tier priorities, budget
//! reserves) are optional overrides: a value left out of the file keeps the
//! compiler's built-in default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.mnemo/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where sessions, events and artifacts are persisted
    #[serde(default)]
    pub storage: StorageConfig,

    /// Session defaults for the CLI and gateway
    #[serde(default)]
    pub session: SessionConfig,

    /// Context compiler settings
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Language-model client settings
    #[serde(default)]
    pub model: ModelConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_path() -> String {
    AppConfig::config_dir()
        .join("runtime.sqlite")
        .to_string_lossy()
        .into_owned()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_id")]
    pub default_id: String,

    /// Ingest `git diff HEAD` before every chat turn
    #[serde(default)]
    pub auto_diff: bool,

    /// Repository used for diff ingestion (defaults to the working directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_path: Option<String>,
}

fn default_session_id() -> String {
    "default-session".into()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_id: default_session_id(),
            auto_diff: false,
            repo_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Token ceiling used when a caller does not pass one
    #[serde(default = "default_budget_tokens")]
    pub default_budget_tokens: usize,

    /// Policy preamble placed at the top of every system message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable_prefix: Option<String>,

    #[serde(default)]
    pub selection: SelectionOverrides,

    #[serde(default)]
    pub budget: BudgetOverrides,
}

fn default_budget_tokens() -> usize {
    4000
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            default_budget_tokens: default_budget_tokens(),
            stable_prefix: None,
            selection: SelectionOverrides::default(),
            budget: BudgetOverrides::default(),
        }
    }
}

/// Evidence-selection overrides. `None` keeps the compiler default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_window: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet_window: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_window: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_window: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_set_priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet_priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_priority: Option<i32>,
}

/// Budget-allocation overrides. `None` keeps the compiler default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message_reserve: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_overhead: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_priority_threshold: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_truncation_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_pinned_chars: Option<usize>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// "stub" (offline canned replies) or "openai" (any OpenAI-compatible API)
    #[serde(default = "default_model_provider")]
    pub provider: String,

    #[serde(default = "default_model_name")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model_provider() -> String {
    "stub".into()
}
fn default_model_name() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_timeout_secs() -> u64 {
    60
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_model_provider(),
            model: default_model_name(),
            api_url: None,
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.mnemo/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `MNEMO_DB`: storage path
    /// - `MNEMO_SESSION`: default session id
    /// - `MNEMO_API_KEY`, then `OPENAI_API_KEY`: model API key
    /// - `MNEMO_PROVIDER`, `MNEMO_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// [`load_from`](Self::load_from) followed by the environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("MNEMO_DB") {
            self.storage.path = path;
        }
        if let Ok(id) = std::env::var("MNEMO_SESSION") {
            self.session.default_id = id;
        }
        if self.model.api_key.is_none() {
            self.model.api_key = std::env::var("MNEMO_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }
        if let Ok(provider) = std::env::var("MNEMO_PROVIDER") {
            self.model.provider = provider;
        }
        if let Ok(model) = std::env::var("MNEMO_MODEL") {
            self.model.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".mnemo")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.temperature < 0.0 || self.model.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !matches!(self.model.provider.as_str(), "stub" | "openai") {
            return Err(ConfigError::ValidationError(format!(
                "model.provider must be \"stub\" or \"openai\", got \"{}\"",
                self.model.provider
            )));
        }

        let sel = &self.compiler.selection;
        for (name, window) in [
            ("diff_window", sel.diff_window),
            ("snippet_window", sel.snippet_window),
            ("pinned_window", sel.pinned_window),
            ("other_window", sel.other_window),
        ] {
            if window == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "compiler.selection.{name} must be > 0"
                )));
            }
        }

        if self.session.default_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "session.default_id must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.compiler.default_budget_tokens, 4000);
        assert_eq!(config.model.provider, "stub");
        assert_eq!(config.gateway.port, 3000);
        assert!(config.storage.path.ends_with("runtime.sqlite"));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model.provider, config.model.provider);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.session.default_id, "default-session");
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.model.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_provider_rejected() {
        let mut config = AppConfig::default();
        config.model.provider = "carrier-pigeon".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_window_rejected() {
        let mut config = AppConfig::default();
        config.compiler.selection.snippet_window = Some(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("snippet_window"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.model.provider, "stub");
    }

    #[test]
    fn compiler_overrides_parse_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[compiler]
default_budget_tokens = 2000
stable_prefix = "You are a careful reviewer."

[compiler.selection]
snippet_window = 30

[compiler.budget]
high_priority_threshold = 90
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.compiler.default_budget_tokens, 2000);
        assert_eq!(
            config.compiler.stable_prefix.as_deref(),
            Some("You are a careful reviewer.")
        );
        assert_eq!(config.compiler.selection.snippet_window, Some(30));
        assert_eq!(config.compiler.selection.diff_window, None);
        assert_eq!(config.compiler.budget.high_priority_threshold, Some(90));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[compiler\nbroken").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.model.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("default_budget_tokens"));
        assert!(toml_str.contains("stub"));
    }
}
