//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The storage backend could not be reached or answered unexpectedly.
    /// Callers on the read path treat this as a miss.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A registered recompute function failed for one key
    #[error("Recompute failed for '{key}': {message}")]
    RecomputeFailed { key: String, message: String },

    /// No recompute function is registered for the key
    #[error("No recompute registered for '{0}'")]
    NoRecompute(String),

    /// A data-change event was rejected at the service boundary
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// An invalidation pattern failed to compile
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Key not found in the store
    #[error("Key not found: {0}")]
    NotFound(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::RecomputeFailed { .. } => StatusCode::BAD_GATEWAY,
            CacheError::NoRecompute(_) | CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::MalformedEvent(_)
            | CacheError::InvalidPattern { .. }
            | CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
