//! Error types for Config Relay.
//!
//! Per-item failures inside a cycle (one bad source, one unreachable link,
//! one failing channel) are logged at the call site and never become a
//! `RelayError`; only store failures, missing configuration, and invalid
//! requests surface through this type.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors returned by handlers and the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate entry: {0}")]
    Duplicate(String),

    #[error("submission already reviewed: {0}")]
    AlreadyReviewed(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("missing configuration: {0}")]
    Configuration(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("settings store error: {0}")]
    Settings(#[from] redis::RedisError),

    #[error("upstream error: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            RelayError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            RelayError::Duplicate(msg) => (StatusCode::CONFLICT, msg.clone()),
            RelayError::AlreadyReviewed(id) => (
                StatusCode::CONFLICT,
                format!("Submission {id} has already been reviewed"),
            ),
            RelayError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            RelayError::Configuration(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Missing configuration: {msg}"),
            ),
            RelayError::Database(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {e}"),
            ),
            RelayError::Settings(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Settings store error: {e}"),
            ),
            RelayError::Upstream(e) => (StatusCode::BAD_GATEWAY, format!("Upstream error: {e}")),
            RelayError::Serialization(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Serialization error: {e}"),
            ),
            RelayError::Internal(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {e}"),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
