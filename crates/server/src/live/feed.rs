//! Live entries feed.
//!
//! Every growth batch from the [`LogWatcher`](hooks_viewer_core::LogWatcher)
//! turns into one `entries` event carrying the *full* current record set.
//! New subscribers get the same full set once on connect.
//!
//! Snapshots and broadcasts share one async lock: a broadcast either lands
//! before a subscriber's snapshot is taken (and is contained in it) or after
//! the subscriber is registered (and is delivered to it). Nothing falls in
//! between.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hooks_viewer_core::{
    read_all_records, LogBatch, LogRecord, Subscriber, SubscriberId, SubscriberRegistry,
};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::{record_batch, record_broadcast, set_subscribers};

/// SSE event name used for every snapshot.
pub const ENTRIES_EVENT: &str = "entries";

pub struct LiveFeed {
    log_path: PathBuf,
    registry: SubscriberRegistry,
    snapshot_lock: Mutex<()>,
}

impl LiveFeed {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            registry: SubscriberRegistry::new(),
            snapshot_lock: Mutex::new(()),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_closed(&self) -> bool {
        self.registry.is_closed()
    }

    /// Send the current snapshot to `subscriber` and register it.
    ///
    /// Returns `None` when the feed is shut down or the initial send fails;
    /// the subscriber has been closed in both cases.
    pub async fn connect(&self, subscriber: Arc<dyn Subscriber>) -> Option<SubscriberId> {
        let _snapshot = self.snapshot_lock.lock().await;
        if self.registry.is_closed() {
            subscriber.close();
            return None;
        }

        let records = match read_all_records(&self.log_path).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Could not read log for initial snapshot; sending empty set");
                Vec::new()
            }
        };
        let payload = encode(&records);

        if let Err(e) = subscriber.send(ENTRIES_EVENT, &payload) {
            debug!(error = %e, "Initial snapshot could not be queued");
            subscriber.close();
            return None;
        }

        let id = self.registry.add(subscriber)?;
        set_subscribers(self.registry.len());
        Some(id)
    }

    /// Unregister a subscriber whose stream went away.
    pub fn disconnect(&self, id: SubscriberId) {
        if self.registry.remove(id) {
            set_subscribers(self.registry.len());
        }
    }

    /// Re-read the log and push the full record set to every subscriber.
    pub async fn publish(&self) {
        let _snapshot = self.snapshot_lock.lock().await;
        if self.registry.is_closed() {
            return;
        }

        let records = match read_all_records(&self.log_path).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Could not re-read log; skipping broadcast");
                return;
            }
        };
        let payload = encode(&records);

        let report = self.registry.broadcast(ENTRIES_EVENT, &payload);
        record_broadcast(report);
        if report.dropped > 0 {
            set_subscribers(self.registry.len());
            info!(dropped = report.dropped, "Dropped unresponsive subscribers");
        }
        debug!(
            records = records.len(),
            delivered = report.delivered,
            "Broadcast entries"
        );
    }

    /// Close every stream. Later connects and broadcasts are refused.
    pub async fn close_all(&self) -> usize {
        let _snapshot = self.snapshot_lock.lock().await;
        let closed = self.registry.close_all();
        set_subscribers(0);
        closed
    }

    /// Drive the feed from the watcher's batch channel until `cancel` fires
    /// or the watcher goes away.
    pub async fn run(
        self: Arc<Self>,
        mut batches: mpsc::UnboundedReceiver<LogBatch>,
        cancel: CancellationToken,
    ) {
        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => break,
                batch = batches.recv() => match batch {
                    Some(batch) => batch,
                    None => break,
                },
            };

            record_batch(&batch);
            debug!(
                start = batch.start,
                end = batch.end,
                records = batch.records.len(),
                "Log grew"
            );
            self.publish().await;
        }
        debug!("Live feed stopped");
    }
}

fn encode(records: &[LogRecord]) -> String {
    match serde_json::to_string(records) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to encode records");
            "[]".to_string()
        }
    }
}
