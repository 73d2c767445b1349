//! Error types for the mnemo domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! The store and the model client each have their own bounded-context error;
//! the top-level [`Error`] carries the operation context around them.

use thiserror::Error;

/// The top-level error type for all mnemo operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Session errors ---
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid event type: {0}")]
    InvalidEventType(String),

    // --- Store errors ---
    #[error("Store failure during {operation} for session {session_id}: {source}")]
    StoreFailure {
        operation: &'static str,
        session_id: String,
        #[source]
        source: StoreError,
    },

    // --- Model errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- I/O (snippet files, git) ---
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Model not configured: {0}")]
    NotConfigured(String),
}

/// Attach operation context to a raw store result.
///
/// Every store call in the runtime goes through this so a failure names
/// the call and the session it happened in. A write against a session the
/// store has never seen surfaces as [`Error::SessionNotFound`].
pub trait StoreResultExt<T> {
    fn context(self, operation: &'static str, session_id: &str) -> Result<T>;
}

impl<T> StoreResultExt<T> for std::result::Result<T, StoreError> {
    fn context(self, operation: &'static str, session_id: &str) -> Result<T> {
        self.map_err(|source| match source {
            StoreError::UnknownSession(id) => Error::SessionNotFound(id),
            source => Error::StoreFailure {
                operation,
                session_id: session_id.to_string(),
                source,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failure_carries_operation_context() {
        let raw: std::result::Result<(), StoreError> =
            Err(StoreError::QueryFailed("disk I/O error".into()));
        let err = raw.context("list_recent_artifacts", "sess-42").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("list_recent_artifacts"));
        assert!(msg.contains("sess-42"));
        assert!(msg.contains("disk I/O error"));
    }

    #[test]
    fn model_error_displays_correctly() {
        let err = Error::Model(ModelError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn session_not_found_names_the_session() {
        let err = Error::SessionNotFound("abc".into());
        assert_eq!(err.to_string(), "Session not found: abc");
    }

    #[test]
    fn unknown_session_becomes_session_not_found() {
        let raw: std::result::Result<i64, StoreError> =
            Err(StoreError::UnknownSession("ghost".into()));
        let err = raw.context("append_event", "ghost").unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(ref id) if id == "ghost"));
    }
}
