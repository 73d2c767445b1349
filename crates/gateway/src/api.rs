//! Session API routes.
//!
//! | Method | Path | |
//! |--------|------|-|
//! | POST | `/chat` | one full turn: ingest, compile, model, observe |
//! | POST | `/ingest/snippet` | store a code snippet |
//! | POST | `/sessions/{id}/events` | record an event (and its artifact) |
//! | POST | `/sessions/{id}/compile` | compile context without calling a model |
//! | POST | `/sessions/{id}/observe` | fold assistant text into session state |
//! | GET | `/sessions/{id}/state` | current session state |
//!
//! Chat, snippet, and event ingestion create the session on first use.
//! Compile, observe, and state answer `404` for a session that was never
//! created.

use crate::SharedState;
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use mnemo_core::{Error, EventType, SessionState};
use mnemo_runtime::{
    CompileOptions, CompileResult, IngestOutcome, SnippetRequest, TurnOptions, TurnOutcome,
    run_turn,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/ingest/snippet", post(snippet_handler))
        .route("/sessions/{id}/events", post(events_handler))
        .route("/sessions/{id}/compile", post(compile_handler))
        .route("/sessions/{id}/observe", post(observe_handler))
        .route("/sessions/{id}/state", get(state_handler))
}

// --- Errors ---

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A runtime error or a rejected request, rendered as JSON.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Runtime(Error),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Runtime(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Runtime(e) => {
                let status = match &e {
                    Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
                    Error::InvalidEventType(_) | Error::Config { .. } => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!(error = %e, "Request failed");
                }
                (status, e.to_string())
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn session_id_or_new(session_id: Option<String>) -> String {
    session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

// --- Chat ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub budget_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub turn: TurnOutcome,
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message is required".into()));
    }

    let session_id = session_id_or_new(request.session_id);
    let session = state.runtime.session(&session_id).await?;

    let mut options =
        TurnOptions::new(request.budget_tokens.unwrap_or(state.default_budget_tokens));
    if let Some(repo) = &state.auto_diff {
        options = options.with_auto_diff(repo.clone());
    }

    let lock = state.turn_lock(&session_id);
    let _turn = lock.lock().await;

    info!(session_id = %session_id, message_len = request.message.len(), "Chat turn");
    let turn = run_turn(&session, state.model.as_ref(), &request.message, &options).await?;

    Ok(Json(ChatResponse { session_id, turn }))
}

// --- Ingestion ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetBody {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub snippet: SnippetRequest,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetResponse {
    pub session_id: String,
    pub artifact_id: String,
}

async fn snippet_handler(
    State(state): State<SharedState>,
    Json(body): Json<SnippetBody>,
) -> ApiResult<(StatusCode, Json<SnippetResponse>)> {
    // The server never reads files on a client's behalf.
    if body.snippet.text.as_deref().is_none_or(str::is_empty) {
        return Err(ApiError::BadRequest("path and text are required".into()));
    }

    let session_id = session_id_or_new(body.session_id);
    let session = state.runtime.session(&session_id).await?;
    let artifact_id = session.ingest_snippet(&body.snippet).await?;

    Ok((
        StatusCode::CREATED,
        Json(SnippetResponse {
            session_id,
            artifact_id,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct EventBody {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
}

async fn events_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<EventBody>,
) -> ApiResult<(StatusCode, Json<IngestOutcome>)> {
    let event_type: EventType = body.event_type.parse()?;
    let payload = match body.payload {
        Value::Null => Value::Object(Default::default()),
        Value::Object(map) => Value::Object(map),
        _ => return Err(ApiError::BadRequest("payload must be a JSON object".into())),
    };

    // Rejected requests never touch the store.
    let session = state.runtime.session(&id).await?;
    let outcome = session.ingest(event_type, &payload).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

// --- Compile / observe / state ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileBody {
    pub user_message: String,
    #[serde(default)]
    pub budget_tokens: Option<usize>,
    #[serde(default)]
    pub stable_prefix: Option<String>,
}

async fn compile_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<CompileBody>,
) -> ApiResult<Json<CompileResult>> {
    let mut options = CompileOptions::new(
        body.user_message,
        body.budget_tokens.unwrap_or(state.default_budget_tokens),
    );
    if let Some(prefix) = body.stable_prefix {
        options = options.with_stable_prefix(prefix);
    }

    let result = state.runtime.handle(&id).compile(&options).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct ObserveBody {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    pub session_id: String,
    pub state: SessionState,
}

async fn observe_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<ObserveBody>,
) -> ApiResult<Json<StateResponse>> {
    let lock = state.turn_lock(&id);
    let _turn = lock.lock().await;

    let session_state = state.runtime.handle(&id).observe(&body.text).await?;
    Ok(Json(StateResponse {
        session_id: id,
        state: session_state,
    }))
}

async fn state_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StateResponse>> {
    let session_state = state.runtime.handle(&id).state().await?;
    Ok(Json(StateResponse {
        session_id: id,
        state: session_state,
    }))
}
