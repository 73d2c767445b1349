//! Model fallback: an ordered chain with per-model timeouts.
//!
//! When a model fails (timeout, rate limit, error) the next one in the
//! chain is tried. The last error is returned if every entry fails.

use async_trait::async_trait;
use mnemo_core::{Message, ModelClient, ModelError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct FallbackModel {
    name: String,
    chain: Vec<FallbackEntry>,
}

struct FallbackEntry {
    model: Arc<dyn ModelClient>,
    timeout: Duration,
}

impl FallbackModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chain: Vec::new(),
        }
    }

    /// Append a model with its own timeout.
    pub fn add(mut self, model: Arc<dyn ModelClient>, timeout: Duration) -> Self {
        self.chain.push(FallbackEntry { model, timeout });
        self
    }

    /// Append a model with the default timeout (120s).
    pub fn add_default(self, model: Arc<dyn ModelClient>) -> Self {
        self.add(model, Duration::from_secs(120))
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

#[async_trait]
impl ModelClient for FallbackModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, ModelError> {
        let mut last_error = ModelError::NotConfigured("No models in fallback chain".into());

        for (i, entry) in self.chain.iter().enumerate() {
            let model_name = entry.model.name();

            info!(
                model = %model_name,
                attempt = i + 1,
                total = self.chain.len(),
                "Fallback: trying model"
            );

            match tokio::time::timeout(entry.timeout, entry.model.complete(messages)).await {
                Ok(Ok(reply)) => return Ok(reply),
                Ok(Err(e)) => {
                    warn!(model = %model_name, error = %e, "Fallback: model failed, trying next");
                    last_error = e;
                }
                Err(_) => {
                    warn!(
                        model = %model_name,
                        timeout_secs = entry.timeout.as_secs(),
                        "Fallback: model timed out, trying next"
                    );
                    last_error = ModelError::Timeout(format!(
                        "Model '{}' timed out after {}s",
                        model_name,
                        entry.timeout.as_secs()
                    ));
                }
            }
        }

        Err(last_error)
    }
}
