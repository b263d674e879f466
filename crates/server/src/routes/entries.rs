// crates/server/src/routes/entries.rs
//! Full snapshot of the hook log.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use hooks_viewer_core::{read_all_records, LogRecord};

use crate::error::ApiResult;
use crate::state::AppState;

/// GET /api/entries - Every record in the log, in file order.
///
/// A missing log file is an empty array. Malformed lines are skipped.
pub async fn list_entries(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<LogRecord>>> {
    let records = read_all_records(state.feed.log_path()).await?;
    tracing::debug!(count = records.len(), "Serving log entries");
    Ok(Json(records))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/entries", get(list_entries))
}
