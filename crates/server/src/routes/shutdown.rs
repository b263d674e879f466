// crates/server/src/routes/shutdown.rs
//! Authenticated remote shutdown.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderMap},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use subtle::ConstantTimeEq;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Delay between answering the request and starting the shutdown, so the
/// response is flushed first.
const SHUTDOWN_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ShutdownResponse {
    pub message: String,
}

/// POST /shutdown - Requires `Authorization: Bearer <secret>`.
pub async fn request_shutdown(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<ShutdownResponse>> {
    let presented = bearer_token(&headers).ok_or(ApiError::Unauthorized)?;
    if !token_matches(presented, &state.shutdown_secret) {
        return Err(ApiError::Unauthorized);
    }

    tracing::info!("Shutdown requested");
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(SHUTDOWN_DELAY).await;
        shutdown.cancel();
    });

    Ok(Json(ShutdownResponse {
        message: "Shutting down".to_string(),
    }))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn token_matches(presented: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/shutdown", post(request_shutdown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_auth(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&with_auth("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&with_auth("Basic abc")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_token_comparison() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cre", "s3cret"));
        assert!(!token_matches("wrong!", "s3cret"));
        assert!(!token_matches("", ""));
    }
}
