//! Model client trait — the language-model capability, injected from outside.
//!
//! The runtime's whole contract with a model is "accepts an ordered message
//! sequence, returns text". Which backend answers (a real API, a stub, a
//! fallback chain) is decided by whoever constructs the client.

use crate::error::ModelError;
use crate::message::Message;
use async_trait::async_trait;

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name (e.g., "openai", "stub").
    fn name(&self) -> &str;

    /// Send compiled messages and return the assistant text.
    async fn complete(&self, messages: &[Message]) -> Result<String, ModelError>;
}
