// crates/server/src/routes/events.rs
//! Live entries stream.
//!
//! - `GET /events` -- SSE stream; `entries` carries the full record array
//!
//! The first event is the current snapshot; one more follows every time
//! the log grows. Admission is rate limited per client.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Router,
};

use crate::error::{ApiError, ApiResult};
use crate::live::{event_stream, SseSubscriber, SubscriptionGuard, SUBSCRIBER_QUEUE};
use crate::metrics::record_rate_limited;
use crate::state::AppState;

/// Comment frame interval that keeps idle proxies from closing the stream.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Identity used when no `X-Forwarded-For` header is present.
const LOCAL_IDENTITY: &str = "127.0.0.1";

/// GET /events -- SSE stream of log snapshots.
///
/// | Event name | When emitted                          |
/// |------------|---------------------------------------|
/// | `entries`  | On connect, and after each log growth |
pub async fn stream_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    if state.shutdown.is_cancelled() || state.feed.is_closed() {
        return Err(ApiError::ShuttingDown);
    }

    let identity = client_identity(&headers);
    if !state.limiter.is_allowed(&identity) {
        record_rate_limited();
        let window = state.limiter.config().window;
        return Err(ApiError::RateLimited {
            identity,
            retry_after_secs: window.as_secs().max(1),
        });
    }

    let (subscriber, receiver) = SseSubscriber::channel(SUBSCRIBER_QUEUE);
    let id = state
        .feed
        .connect(subscriber)
        .await
        .ok_or(ApiError::ShuttingDown)?;
    tracing::debug!(subscriber_id = id, identity = %identity, "Stream client connected");

    let stream = event_stream(receiver, SubscriptionGuard::new(state.feed.clone(), id));
    let sse = Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL));

    Ok(([(header::CONNECTION, "keep-alive")], sse).into_response())
}

/// First `X-Forwarded-For` entry, or loopback.
fn client_identity(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(LOCAL_IDENTITY)
        .to_string()
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/events", get(stream_events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_identity_defaults_to_loopback() {
        assert_eq!(client_identity(&HeaderMap::new()), "127.0.0.1");
    }

    #[test]
    fn test_identity_uses_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_identity(&headers), "203.0.113.9");
    }

    #[test]
    fn test_blank_forwarded_header_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" "));
        assert_eq!(client_identity(&headers), "127.0.0.1");
    }
}
