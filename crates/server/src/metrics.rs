//! Application metrics for Prometheus monitoring.
//!
//! This module provides:
//! - Prometheus metrics recorder initialization
//! - Metric definitions (counters, gauges)
//! - Helper functions for recording metrics
//! - Rendering for the `/metrics` endpoint

use hooks_viewer_core::{BroadcastReport, LogBatch};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// This should be called once at application startup, before any metrics are recorded.
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    let mut installed = false;
    PROMETHEUS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        match metrics::set_global_recorder(recorder) {
            Ok(()) => {
                installed = true;
                describe_metrics();
                tracing::info!("Prometheus metrics initialized");
            }
            Err(_) => tracing::warn!("Failed to set global metrics recorder (already set)"),
        }
        handle
    });
    installed
}

fn describe_metrics() {
    describe_gauge!("viewer_stream_subscribers", "Currently connected stream subscribers");
    describe_counter!("viewer_broadcasts_total", "Entry broadcasts sent to subscribers");
    describe_counter!(
        "viewer_subscribers_dropped_total",
        "Subscribers removed after a failed send"
    );
    describe_counter!(
        "viewer_rate_limited_total",
        "Stream connections denied by the rate limiter"
    );
    describe_counter!("viewer_records_appended_total", "Records parsed from log growth");
    describe_counter!("viewer_malformed_lines_total", "Log lines skipped as malformed");
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

pub fn set_subscribers(count: usize) {
    gauge!("viewer_stream_subscribers").set(count as f64);
}

pub fn record_broadcast(report: BroadcastReport) {
    counter!("viewer_broadcasts_total").increment(1);
    if report.dropped > 0 {
        counter!("viewer_subscribers_dropped_total").increment(report.dropped as u64);
    }
}

pub fn record_rate_limited() {
    counter!("viewer_rate_limited_total").increment(1);
}

pub fn record_batch(batch: &LogBatch) {
    counter!("viewer_records_appended_total").increment(batch.records.len() as u64);
    if batch.malformed > 0 {
        counter!("viewer_malformed_lines_total").increment(batch.malformed as u64);
    }
}
