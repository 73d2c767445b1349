//! Deterministic canned replies for offline use and demos.
//!
//! Every reply carries state markers so a full compile → observe loop can
//! be exercised without a network.

use async_trait::async_trait;
use mnemo_core::{Message, ModelClient, ModelError, Role};

pub struct StubModel;

impl StubModel {
    pub fn new() -> Self {
        Self
    }

    /// The reply for a given user message. Chosen by `chars % 3`.
    pub fn reply_for(user_message: &str) -> String {
        match user_message.chars().count() % 3 {
            0 => format!(
                "I understand you're asking about: \"{user_message}\"\n\n\
                 Decision: Use Rust for type safety\n\
                 Constraint: Must maintain backward compatibility\n\
                 Open: Should we add integration tests?\n\n\
                 Based on the context provided, I recommend focusing on the core functionality first."
            ),
            1 => format!(
                "Thanks for the question about \"{user_message}\".\n\n\
                 Decision: Implement feature incrementally\n\
                 Glossary: MVP - Minimum Viable Product\n\n\
                 Let me help you with that. The key consideration here is to balance speed with quality."
            ),
            _ => format!(
                "Regarding \"{user_message}\":\n\n\
                 Constraint: API must be RESTful\n\
                 Decision: Use JSON for data exchange\n\
                 Open: What authentication method should we use?\n\n\
                 I'd suggest starting with a simple implementation and iterating based on feedback."
            ),
        }
    }
}

impl Default for StubModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelClient for StubModel {
    fn name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, ModelError> {
        let user_message = messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(Self::reply_for(user_message))
    }
}
