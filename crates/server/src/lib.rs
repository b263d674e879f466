// crates/server/src/lib.rs
//! Hooks viewer server library.
//!
//! Serves the dashboard, a JSON snapshot of the hook log, and an SSE stream
//! that pushes the full record set every time the log grows.

pub mod config;
pub mod error;
pub mod live;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::ServerConfig;
pub use error::*;
pub use metrics::init_metrics;
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::Router;
use hooks_viewer_core::LogWatcher;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API, stream and static routes
/// - CORS restricted to the dashboard's own localhost origin
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let origin = match HeaderValue::from_str(&state.local_origin()) {
        Ok(v) => AllowOrigin::exact(v),
        Err(_) => AllowOrigin::list([]),
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST]);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// A running viewer: log watcher, live feed and the shutdown sequence.
///
/// Shutdown (from `POST /shutdown` or [`stop`](Self::stop)) closes every
/// stream, then stops the watcher, then releases [`serve`](Self::serve).
pub struct ViewerServer {
    state: Arc<AppState>,
    watcher: Arc<LogWatcher>,
    stopped: CancellationToken,
}

impl ViewerServer {
    /// Start watching the log and pumping growth into the live feed.
    pub async fn start(config: &ServerConfig, shutdown_secret: String) -> Self {
        let state = AppState::new(config, shutdown_secret);
        let (watcher, batches) = LogWatcher::new(config.log_file.clone(), config.watcher());
        watcher.start().await;

        tokio::spawn(state.feed.clone().run(batches, state.shutdown.clone()));

        let stopped = CancellationToken::new();
        tokio::spawn(shutdown_sequence(
            state.clone(),
            watcher.clone(),
            stopped.clone(),
        ));

        Self {
            state,
            watcher,
            stopped,
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn watcher(&self) -> &Arc<LogWatcher> {
        &self.watcher
    }

    pub fn router(&self) -> Router {
        create_app(self.state.clone())
    }

    /// Token that requests shutdown when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    /// Request shutdown and wait until every stream is closed and the
    /// watcher has stopped. Idempotent.
    pub async fn stop(&self) {
        self.state.shutdown.cancel();
        self.stopped.cancelled().await;
    }

    /// Resolve once the shutdown sequence has finished.
    pub async fn stopped(&self) {
        self.stopped.cancelled().await;
    }

    /// Accept connections until shutdown completes.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let app = self.router();
        let stopped = self.stopped.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stopped.cancelled().await })
            .await
    }
}

async fn shutdown_sequence(
    state: Arc<AppState>,
    watcher: Arc<LogWatcher>,
    stopped: CancellationToken,
) {
    state.shutdown.cancelled().await;
    let closed = state.feed.close_all().await;
    watcher.stop().await;
    tracing::info!(closed_streams = closed, "Viewer shut down");
    stopped.cancel();
}
