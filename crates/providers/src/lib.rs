//! Model clients for mnemo.
//!
//! All clients implement `mnemo_core::ModelClient`. The runtime never picks
//! one itself; [`build_from_config`] does that for the CLI and gateway.

pub mod fallback;
pub mod openai_compat;
pub mod stub;

pub use fallback::FallbackModel;
pub use openai_compat::OpenAiCompatModel;
pub use stub::StubModel;

use mnemo_config::ModelConfig;
use mnemo_core::{ModelClient, ModelError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default endpoint when `[model] api_url` is not set.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Build the model client described by `[model]`.
///
/// - `provider = "stub"` gives the offline [`StubModel`].
/// - `provider = "openai"` gives an [`OpenAiCompatModel`] wrapped in a
///   [`FallbackModel`] that answers from the stub when the API fails.
///   Without an API key this degrades to the stub with a warning.
pub fn build_from_config(config: &ModelConfig) -> Result<Arc<dyn ModelClient>, ModelError> {
    match config.provider.as_str() {
        "stub" => Ok(Arc::new(StubModel::new())),
        "openai" => {
            let Some(api_key) = config.api_key.clone().filter(|k| !k.is_empty()) else {
                warn!("model.provider is \"openai\" but no API key is set; using stub replies");
                return Ok(Arc::new(StubModel::new()));
            };
            let base_url = config.api_url.as_deref().unwrap_or(OPENAI_BASE_URL);
            let primary = OpenAiCompatModel::new("openai", base_url, api_key, &config.model)
                .with_temperature(config.temperature)
                .with_max_tokens(config.max_tokens)
                .with_timeout(Duration::from_secs(config.timeout_secs));

            info!(model = %config.model, base_url, "Using OpenAI-compatible model");
            Ok(Arc::new(
                FallbackModel::new("openai+stub")
                    .add(Arc::new(primary), Duration::from_secs(config.timeout_secs))
                    .add_default(Arc::new(StubModel::new())),
            ))
        }
        other => Err(ModelError::NotConfigured(format!(
            "unknown model provider '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_by_default() {
        let client = build_from_config(&ModelConfig::default()).unwrap();
        assert_eq!(client.name(), "stub");
    }

    #[test]
    fn openai_without_key_degrades_to_stub() {
        let config = ModelConfig {
            provider: "openai".into(),
            api_key: None,
            ..Default::default()
        };
        assert_eq!(build_from_config(&config).unwrap().name(), "stub");
    }

    #[test]
    fn openai_with_key_is_wrapped_in_fallback() {
        let config = ModelConfig {
            provider: "openai".into(),
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        assert_eq!(build_from_config(&config).unwrap().name(), "openai+stub");
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = ModelConfig {
            provider: "pigeon".into(),
            ..Default::default()
        };
        assert!(matches!(
            build_from_config(&config),
            Err(ModelError::NotConfigured(_))
        ));
    }
}
