//! Registry of live stream subscribers.
//!
//! The registry is the only place the subscriber set is mutated. A failed
//! send removes (and closes) that one subscriber; the rest of the broadcast
//! continues. Sends are expected to be non-blocking, so a slow consumer
//! shows up as a failed send rather than stalling everyone else.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tracing::{debug, info};

use crate::error::SendError;

/// A push-capable output sink for one connected viewer.
pub trait Subscriber: Send + Sync {
    /// Queue a named event. Must not block.
    fn send(&self, event: &str, payload: &str) -> Result<(), SendError>;

    /// Terminate the stream. Called at most once by the registry.
    fn close(&self);
}

pub type SubscriberId = u64;

/// Outcome of one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: DashMap<SubscriberId, Arc<dyn Subscriber>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    /// Serializes broadcasts so each subscriber sees them in one order.
    broadcast_lock: Mutex<()>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber.
    ///
    /// Returns `None` (and closes the sink) once the registry has been shut
    /// down.
    pub fn add(&self, subscriber: Arc<dyn Subscriber>) -> Option<SubscriberId> {
        if self.closed.load(Ordering::Acquire) {
            subscriber.close();
            return None;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, subscriber);

        // close_all may have drained the map between the check and the insert.
        if self.closed.load(Ordering::Acquire) {
            if let Some((_, sub)) = self.subscribers.remove(&id) {
                sub.close();
            }
            return None;
        }

        debug!(subscriber_id = id, total = self.subscribers.len(), "Subscriber added");
        Some(id)
    }

    /// Unregister a subscriber without closing it. Returns whether it was
    /// still registered.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            debug!(subscriber_id = id, total = self.subscribers.len(), "Subscriber removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Send `payload` as `event` to every registered subscriber.
    ///
    /// Works on a snapshot of the set, so concurrent `add`/`remove` calls
    /// never block on, or invalidate, an in-progress broadcast.
    pub fn broadcast(&self, event: &str, payload: &str) -> BroadcastReport {
        let _serial = self
            .broadcast_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            return BroadcastReport::default();
        }

        let snapshot: Vec<(SubscriberId, Arc<dyn Subscriber>)> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut report = BroadcastReport::default();
        for (id, subscriber) in snapshot {
            match subscriber.send(event, payload) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(subscriber_id = id, error = %e, "Dropping subscriber after failed send");
                    if self.subscribers.remove(&id).is_some() {
                        subscriber.close();
                    }
                    report.dropped += 1;
                }
            }
        }
        report
    }

    /// Close every subscriber exactly once and refuse further work.
    ///
    /// Returns the number of subscribers closed.
    pub fn close_all(&self) -> usize {
        let _serial = self
            .broadcast_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.closed.store(true, Ordering::Release);

        let ids: Vec<SubscriberId> = self.subscribers.iter().map(|e| *e.key()).collect();
        let mut closed = 0;
        for id in ids {
            if let Some((_, subscriber)) = self.subscribers.remove(&id) {
                subscriber.close();
                closed += 1;
            }
        }

        info!(closed, "Closed all subscribers");
        closed
    }
}
