//! Shared helpers for the server integration tests.

#![allow(dead_code)]

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// How long a test waits for a stream frame before failing.
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Incrementally reads `event:`/`data:` blocks from an SSE response body.
pub struct SseReader {
    body: Body,
    buffer: String,
}

impl SseReader {
    pub fn new(response: Response<Body>) -> Self {
        Self {
            body: response.into_body(),
            buffer: String::new(),
        }
    }

    /// Next named event as `(event, data)`. Keep-alive comments are skipped.
    /// `None` once the stream has ended.
    pub async fn next_event(&mut self) -> Option<(String, serde_json::Value)> {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..end + 2).collect();
                if let Some(event) = parse_block(&block) {
                    return Some(event);
                }
                continue;
            }

            let frame = tokio::time::timeout(FRAME_TIMEOUT, self.body.frame())
                .await
                .expect("timed out waiting for SSE frame")?
                .expect("SSE body error");
            if let Ok(data) = frame.into_data() {
                self.buffer.push_str(std::str::from_utf8(&data).unwrap());
            }
        }
    }

    /// Skip events until one's `data` satisfies `pred`.
    pub async fn next_matching(
        &mut self,
        pred: impl Fn(&serde_json::Value) -> bool,
    ) -> Option<serde_json::Value> {
        while let Some((event, data)) = self.next_event().await {
            assert_eq!(event, "entries");
            if pred(&data) {
                return Some(data);
            }
        }
        None
    }
}

fn parse_block(block: &str) -> Option<(String, serde_json::Value)> {
    let mut event = None;
    let mut data = String::new();
    for line in block.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            event = Some(name.trim().to_string());
        } else if let Some(chunk) = line.strip_prefix("data:") {
            data.push_str(chunk.trim_start());
        }
    }
    let event = event?;
    Some((event, serde_json::from_str(&data).unwrap()))
}
