//! Integration tests for the JSON API, static assets and metrics.

mod common;

use std::path::Path;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{body_string, get, send};
use hooks_viewer_server::routes::assets::CONTENT_SECURITY_POLICY;
use hooks_viewer_server::{create_app, init_metrics, AppState, ServerConfig};
use pretty_assertions::assert_eq;
use serde_json::json;

const INDEX_HTML: &str = "<!doctype html><title>hooks</title>";

fn app_for(log: &Path, static_dir: Option<&Path>, port: u16) -> Router {
    let mut config = ServerConfig::for_log_file(log);
    config.port = port;
    config.static_dir = static_dir.map(Path::to_path_buf);
    create_app(AppState::new(&config, "secret".into()))
}

fn dist_fixture() -> tempfile::TempDir {
    let dist = tempfile::tempdir().unwrap();
    std::fs::write(dist.path().join("index.html"), INDEX_HTML).unwrap();
    std::fs::create_dir(dist.path().join("assets")).unwrap();
    std::fs::write(dist.path().join("assets").join("app.js"), "console.log(1)").unwrap();
    dist
}

#[tokio::test]
async fn test_entries_returns_valid_records_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("hooks-log.txt");
    std::fs::write(&log, "{\"a\":1}\nnot json\n\n{\"b\":2}\n").unwrap();

    let app = app_for(&log, None, 3456);
    let response = get(&app, "/api/entries").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:3456"
    );

    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body, json!([{"a": 1}, {"b": 2}]));
}

#[tokio::test]
async fn test_entries_unreadable_log_is_500() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the log file should be cannot be read as text.
    let app = app_for(dir.path(), None, 3456);

    let response = get(&app, "/api/entries").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"], "Failed to read log file");
}

#[tokio::test]
async fn test_index_served_with_security_headers() {
    let dist = dist_fixture();
    let app = app_for(Path::new("/nonexistent/log"), Some(dist.path()), 3456);

    let response = get(&app, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers.get(header::CONTENT_TYPE).unwrap(),
        "text/html; charset=utf-8"
    );
    assert_eq!(
        headers.get(header::CONTENT_SECURITY_POLICY).unwrap(),
        CONTENT_SECURITY_POLICY
    );
    assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
    assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
    assert_eq!(body_string(response).await, INDEX_HTML);
}

#[tokio::test]
async fn test_asset_served_with_its_content_type() {
    let dist = dist_fixture();
    let app = app_for(Path::new("/nonexistent/log"), Some(dist.path()), 3456);

    let response = get(&app, "/assets/app.js").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/javascript"
    );
    assert!(response
        .headers()
        .get(header::CONTENT_SECURITY_POLICY)
        .is_none());
    assert_eq!(body_string(response).await, "console.log(1)");
}

#[tokio::test]
async fn test_unknown_paths_fall_back_to_index() {
    let dist = dist_fixture();
    let app = app_for(Path::new("/nonexistent/log"), Some(dist.path()), 3456);

    for uri in ["/sessions/abc", "/assets/missing.js", "/assets"] {
        let response = get(&app, uri).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert_eq!(body_string(response).await, INDEX_HTML, "{uri}");
    }
}

#[tokio::test]
async fn test_path_traversal_is_400() {
    let dist = dist_fixture();
    let app = app_for(Path::new("/nonexistent/log"), Some(dist.path()), 3456);

    for uri in ["/../secret.txt", "/assets/../../secret.txt", "/%2e%2e/secret.txt"] {
        let response = get(&app, uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn test_non_get_unknown_route_is_404() {
    let dist = dist_fixture();
    let app = app_for(Path::new("/nonexistent/log"), Some(dist.path()), 3456);

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/anything")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint_renders_prometheus_text() {
    init_metrics();
    let app = app_for(Path::new("/nonexistent/log"), None, 3456);

    // Populate at least one series.
    let limited = {
        let mut config = ServerConfig::for_log_file("/nonexistent/log");
        config.rate_limit_max = 0;
        create_app(AppState::new(&config, "secret".into()))
    };
    assert_eq!(
        get(&limited, "/events").await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    let response = get(&app, "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .contains("text/plain"));
    assert!(body_string(response)
        .await
        .contains("viewer_rate_limited_total"));
}
