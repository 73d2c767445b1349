//! OpenAI-compatible chat completions client.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM, and anything else that
//! serves `/chat/completions`. Non-streaming only.

use async_trait::async_trait;
use mnemo_core::{Message, ModelClient, ModelError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub struct OpenAiCompatModel {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompatModel {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.7,
            max_tokens: 1000,
            client: build_client(Duration::from_secs(120)),
        }
    }

    /// OpenAI proper.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openai", crate::OPENAI_BASE_URL, api_key, model)
    }

    /// A local Ollama server. Ollama ignores the key.
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama",
            model,
        )
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body<'a>(&'a self, messages: &'a [Message]) -> ApiRequest<'a> {
        ApiRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| ApiMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        }
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

#[async_trait]
impl ModelClient for OpenAiCompatModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(provider = %self.name, model = %self.model, messages = messages.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(messages))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout(e.to_string())
                } else {
                    ModelError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ModelError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ModelError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Model API returned error");
            return Err(ModelError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| ModelError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;
    use serde_json::{Value, json};

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn status_only(status: StatusCode) -> Router {
        Router::new().route(
            "/chat/completions",
            post(move || async move { (status, "nope") }),
        )
    }

    #[test]
    fn openai_constructor() {
        let model = OpenAiCompatModel::openai("sk-test", "gpt-4o-mini");
        assert_eq!(model.name(), "openai");
        assert_eq!(model.base_url(), "https://api.openai.com/v1");
        assert_eq!(model.model(), "gpt-4o-mini");
    }

    #[test]
    fn ollama_constructor() {
        let model = OpenAiCompatModel::ollama(None, "llama3");
        assert_eq!(model.name(), "ollama");
        assert_eq!(model.base_url(), "http://localhost:11434/v1");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let model = OpenAiCompatModel::new("x", "http://host/v1/", "k", "m");
        assert_eq!(model.base_url(), "http://host/v1");
    }

    #[test]
    fn request_body_shape() {
        let model = OpenAiCompatModel::new("x", "http://host", "k", "m")
            .with_temperature(0.2)
            .with_max_tokens(64);
        let messages = [Message::system("ctx"), Message::user("hi")];
        let body = serde_json::to_value(model.request_body(&messages)).unwrap();
        assert_eq!(body["model"], "m");
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let router = Router::new().route(
            "/chat/completions",
            post(|axum::Json(body): axum::Json<Value>| async move {
                let last = body["messages"][1]["content"].as_str().unwrap_or("").to_string();
                axum::Json(json!({
                    "choices": [{"message": {"role": "assistant", "content": format!("echo: {last}")}}]
                }))
            }),
        );
        let base = serve(router).await;
        let model = OpenAiCompatModel::new("mock", base, "k", "m");

        let reply = model
            .complete(&[Message::system("ctx"), Message::user("ping")])
            .await
            .unwrap();
        assert_eq!(reply, "echo: ping");
    }

    #[tokio::test]
    async fn status_codes_map_to_errors() {
        let base = serve(status_only(StatusCode::TOO_MANY_REQUESTS)).await;
        let err = OpenAiCompatModel::new("mock", base, "k", "m")
            .complete(&[Message::user("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::RateLimited { .. }));

        let base = serve(status_only(StatusCode::UNAUTHORIZED)).await;
        let err = OpenAiCompatModel::new("mock", base, "k", "m")
            .complete(&[Message::user("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::AuthenticationFailed(_)));

        let base = serve(status_only(StatusCode::BAD_GATEWAY)).await;
        let err = OpenAiCompatModel::new("mock", base, "k", "m")
            .complete(&[Message::user("x")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ModelError::ApiError { status_code: 502, ref message } if message == "nope"
        ));
    }

    #[tokio::test]
    async fn empty_choices_is_an_api_error() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { axum::Json(json!({"choices": []})) }),
        );
        let base = serve(router).await;
        let err = OpenAiCompatModel::new("mock", base, "k", "m")
            .complete(&[Message::user("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::ApiError { status_code: 200, .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let err = OpenAiCompatModel::new("mock", "http://127.0.0.1:1", "k", "m")
            .complete(&[Message::user("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Network(_)));
    }
}
