//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

/// Errors raised by the detection and enforcement core
#[derive(Debug, Error)]
pub enum FenceError {
    /// A component the operation depends on was never initialized
    #[error("component not initialized: {0}")]
    NotInitialized(String),

    /// Isolation is not re-entrant
    #[error("{0} is already isolated")]
    AlreadyIsolated(String),

    #[error("{0} is not currently isolated")]
    NotIsolated(String),

    /// Durable store unreachable or a write failed
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// A persisted baseline row could not be decoded
    #[error("failed to load baseline for {agent}: {reason}")]
    Load { agent: String, reason: String },

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

#[derive(Debug)]
pub enum AppError {
    // Enforcement precondition errors
    AlreadyIsolated(String),
    NotIsolated(String),

    // Validation errors
    ValidationError(String),

    // Components missing
    ServiceUnavailable(String),

    // Generic errors
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::AlreadyIsolated(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::NotIsolated(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "System not initialized")
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg.as_str())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<FenceError> for AppError {
    fn from(err: FenceError) -> Self {
        match err {
            FenceError::AlreadyIsolated(agent) => {
                AppError::AlreadyIsolated(format!("{} is already isolated", agent))
            }
            FenceError::NotIsolated(agent) => {
                AppError::NotIsolated(format!("{} is not currently isolated", agent))
            }
            FenceError::NotInitialized(what) => AppError::ServiceUnavailable(what),
            FenceError::Persistence(e) => {
                tracing::error!("Database error: {}", e);
                AppError::InternalError("Database error occurred".to_string())
            }
            other => AppError::InternalError(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::from(FenceError::AlreadyIsolated("a".into())), StatusCode::BAD_REQUEST),
            (AppError::from(FenceError::NotIsolated("a".into())), StatusCode::BAD_REQUEST),
            (AppError::from(FenceError::NotInitialized("detector".into())), StatusCode::SERVICE_UNAVAILABLE),
            (
                AppError::from(FenceError::Persistence(StoreError::Unavailable("down".into()))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
