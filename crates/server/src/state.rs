// crates/server/src/state.rs
//! Application state for the Axum server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use hooks_viewer_core::RateLimiter;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::live::LiveFeed;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Port the dashboard is served from; the CORS origin is derived from it.
    pub port: u16,
    /// Built dashboard directory. `None` serves the API only.
    pub static_dir: Option<PathBuf>,
    /// Bearer secret accepted by `POST /shutdown`.
    pub shutdown_secret: String,
    /// Admission limiter for `GET /events`.
    pub limiter: RateLimiter,
    /// Snapshot reads and live broadcasts of the hook log.
    pub feed: Arc<LiveFeed>,
    /// Cancelled once an authenticated shutdown has been requested.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: &ServerConfig, shutdown_secret: String) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            port: config.port,
            static_dir: config.resolved_static_dir(),
            shutdown_secret,
            limiter: RateLimiter::new(config.rate_limit()),
            feed: Arc::new(LiveFeed::new(config.log_file.clone())),
            shutdown: CancellationToken::new(),
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// `http://localhost:<port>`, the only origin allowed to read the API.
    pub fn local_origin(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}
