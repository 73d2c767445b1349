//! HTTP API gateway for mnemo.
//!
//! Exposes the runtime over REST: a chat endpoint that runs a full turn,
//! ingestion endpoints, and per-session compile/observe/state.
//!
//! Built on Axum.

pub mod api;

use axum::extract::DefaultBodyLimit;
use axum::{Router, response::Json, routing::get};
use mnemo_config::AppConfig;
use mnemo_core::ModelClient;
use mnemo_runtime::Runtime;
use mnemo_store::SqliteStore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub runtime: Runtime,
    pub model: Arc<dyn ModelClient>,
    /// Budget used when a request does not name one
    pub default_budget_tokens: usize,
    /// Repository diffed before each chat turn, when set
    pub auto_diff: Option<String>,
    turn_locks: SessionLocks,
}

impl GatewayState {
    pub fn new(runtime: Runtime, model: Arc<dyn ModelClient>, default_budget_tokens: usize) -> Self {
        Self {
            runtime,
            model,
            default_budget_tokens,
            auto_diff: None,
            turn_locks: SessionLocks::default(),
        }
    }

    pub fn with_auto_diff(mut self, repo_path: impl Into<String>) -> Self {
        self.auto_diff = Some(repo_path.into());
        self
    }

    /// The lock serializing turns on one session.
    pub(crate) fn turn_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.turn_locks.get(session_id)
    }
}

pub type SharedState = Arc<GatewayState>;

/// One async mutex per session id.
///
/// The runtime leaves per-session serialization to its caller; the gateway
/// holds one of these across each chat turn and observe.
#[derive(Default)]
struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    fn get(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());

        // Evict locks nobody holds once the map gets large
        if locks.len() > 10_000 {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }

        Arc::clone(locks.entry(session_id.to_string()).or_default())
    }
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .merge(api::api_router())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let store = SqliteStore::new(&config.storage.path).await?;
    let runtime = Runtime::from_config(Arc::new(store), &config.compiler)?;
    let model = mnemo_providers::build_from_config(&config.model)?;

    let mut state = GatewayState::new(runtime, model, config.compiler.default_budget_tokens);
    if config.session.auto_diff {
        let repo = match &config.session.repo_path {
            Some(path) => path.clone(),
            None => std::env::current_dir()?.display().to_string(),
        };
        state = state.with_auto_diff(repo);
    }

    let app = build_router(Arc::new(state));

    info!(addr = %addr, storage = %config.storage.path, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use mnemo_providers::StubModel;
    use mnemo_store::InMemoryStore;
    use tower::ServiceExt;

    pub(crate) fn test_state() -> SharedState {
        let runtime = Runtime::new(Arc::new(InMemoryStore::new()));
        Arc::new(GatewayState::new(runtime, Arc::new(StubModel::new()), 2000))
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state());

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[test]
    fn same_session_shares_a_lock() {
        let locks = SessionLocks::default();
        let a = locks.get("s");
        let b = locks.get("s");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &locks.get("other")));
    }
}
