//! Route handlers for the viewer server.

pub mod assets;
pub mod entries;
pub mod events;
pub mod health;
pub mod metrics;
pub mod shutdown;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined router.
///
/// Routes:
/// - GET  /api/health  - Health check
/// - GET  /api/entries - Every record in the hook log
/// - GET  /events      - SSE stream of `entries` snapshots
/// - POST /shutdown    - Authenticated shutdown
/// - GET  /metrics     - Prometheus metrics
/// - GET  /*           - Dashboard static files (SPA fallback)
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", entries::router())
        .merge(events::router())
        .merge(shutdown::router())
        .merge(metrics::router())
        .fallback(assets::serve_asset)
        .with_state(state)
}
