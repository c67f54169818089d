//! Error types for the relay service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AppError>;

/// Closed set of failure kinds surfaced to the chat panel.
///
/// Every backend-facing failure is folded into one of these at the relay
/// boundary so the panel can render a differentiated state.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message")]
pub enum RelayError {
    /// Transport, status, or decoding failure before any chunk was delivered.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Failure after partial content had already been delivered.
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),

    /// The model listing call failed. Never fatal.
    #[error("model list unavailable: {0}")]
    ModelListUnavailable(String),
}

/// Wire name of a [`RelayError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayErrorKind {
    BackendUnavailable,
    StreamInterrupted,
    ModelListUnavailable,
}

impl RelayError {
    pub fn kind(&self) -> RelayErrorKind {
        match self {
            RelayError::BackendUnavailable(_) => RelayErrorKind::BackendUnavailable,
            RelayError::StreamInterrupted(_) => RelayErrorKind::StreamInterrupted,
            RelayError::ModelListUnavailable(_) => RelayErrorKind::ModelListUnavailable,
        }
    }

    /// Human readable detail without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            RelayError::BackendUnavailable(m)
            | RelayError::StreamInterrupted(m)
            | RelayError::ModelListUnavailable(m) => m,
        }
    }
}

impl std::fmt::Display for RelayErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayErrorKind::BackendUnavailable => write!(f, "BackendUnavailable"),
            RelayErrorKind::StreamInterrupted => write!(f, "StreamInterrupted"),
            RelayErrorKind::ModelListUnavailable => write!(f, "ModelListUnavailable"),
        }
    }
}

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("backend error: {0}")]
    BackendError(String),

    #[error("malformed stream chunk: {0}")]
    MalformedChunk(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::HttpClient(_) | AppError::BackendError(_) | AppError::MalformedChunk(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Relay(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> String {
        match self {
            AppError::Config(_) => "config_error".to_string(),
            AppError::HttpClient(_) => "http_client_error".to_string(),
            AppError::BackendError(_) => "backend_error".to_string(),
            AppError::MalformedChunk(_) => "malformed_chunk".to_string(),
            AppError::InvalidRequest(_) => "invalid_request".to_string(),
            AppError::SessionNotFound(_) => "session_not_found".to_string(),
            AppError::Relay(e) => e.kind().to_string(),
            AppError::Internal(_) => "internal_error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.error_code(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
