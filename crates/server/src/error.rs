// crates/server/src/error.rs
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use hooks_viewer_core::WatchError;
use serde::Serialize;
use thiserror::Error;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing or invalid bearer token")]
    Unauthorized,

    #[error("Rate limit exceeded for {identity}")]
    RateLimited { identity: String, retry_after_secs: u64 },

    #[error("Server is shutting down")]
    ShuttingDown,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Log read error: {0}")]
    Log(#[from] WatchError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::Unauthorized => {
                tracing::warn!("Rejected request with missing or invalid bearer token");
                (StatusCode::UNAUTHORIZED, ErrorResponse::new("Unauthorized"))
            }
            ApiError::RateLimited {
                identity,
                retry_after_secs,
            } => {
                tracing::warn!(identity = %identity, "Stream connection rate limited");
                let body = ErrorResponse::with_details(
                    "Rate limit exceeded",
                    "Too many stream connections. Please try again later.",
                );
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, retry_after_secs.to_string())],
                    Json(body),
                )
                    .into_response();
            }
            ApiError::ShuttingDown => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::new("Server is shutting down"),
            ),
            ApiError::NotFound(what) => {
                tracing::debug!(path = %what, "Not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Not found", what.clone()),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
            ApiError::Log(err) => {
                tracing::error!(error = %err, "Failed to read hook log");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details("Failed to read log file", err.to_string()),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
