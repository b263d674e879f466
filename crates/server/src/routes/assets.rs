// crates/server/src/routes/assets.rs
//! Dashboard static files with SPA fallback.
//!
//! Any GET that no other route claims is resolved against the static
//! directory. Paths that do not name a file fall back to `index.html` so
//! client-side routes survive a reload. HTML responses carry the dashboard's
//! security headers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'; img-src 'self' data:";

const INDEX_FILE: &str = "index.html";

/// Fallback handler for everything outside the API.
pub async fn serve_asset(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> ApiResult<Response> {
    if method != Method::GET && method != Method::HEAD {
        return Err(ApiError::NotFound(uri.path().to_string()));
    }
    let Some(root) = state.static_dir.as_deref() else {
        return Err(ApiError::NotFound(uri.path().to_string()));
    };

    let relative = resolve_request_path(uri.path())?;
    if let Some(response) = read_asset(&root.join(&relative)).await {
        return Ok(response);
    }

    read_asset(&root.join(INDEX_FILE))
        .await
        .ok_or_else(|| ApiError::NotFound(uri.path().to_string()))
}

/// Map a request path onto a path relative to the static directory.
///
/// Percent-encoding is undone first, so `%2e%2e` is caught the same as `..`.
fn resolve_request_path(request_path: &str) -> ApiResult<PathBuf> {
    let decoded = urlencoding::decode(request_path)
        .map_err(|_| ApiError::BadRequest("path is not valid UTF-8".into()))?;

    let mut relative = PathBuf::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(ApiError::BadRequest("path traversal".into())),
            s if s.contains(|c: char| matches!(c, '\\' | '\0' | ':')) => {
                return Err(ApiError::BadRequest("invalid path segment".into()))
            }
            s => relative.push(s),
        }
    }

    if relative.as_os_str().is_empty() {
        relative.push(INDEX_FILE);
    }
    Ok(relative)
}

async fn read_asset(path: &Path) -> Option<Response> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    if !meta.is_file() {
        return None;
    }
    let body = match tokio::fs::read(path).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Static file unreadable");
            return None;
        }
    };

    let content_type = content_type_for(path);
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if content_type.starts_with("text/html") {
        for (name, value) in security_headers() {
            headers.insert(name, HeaderValue::from_static(value));
        }
    }
    Some(response)
}

fn security_headers() -> [(HeaderName, &'static str); 3] {
    [
        (header::CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "DENY"),
    ]
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("js" | "mjs") => "application/javascript",
        Some("css") => "text/css",
        Some("json" | "map") => "application/json",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("eot") => "application/vnd.ms-fontobject",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
