//! SSE transport for [`Subscriber`].
//!
//! The registry pushes into a bounded queue with `try_send`; the HTTP
//! response drains it. A full queue means the client is not keeping up and
//! is reported as a failed send, which gets the subscriber dropped.

use std::convert::Infallible;
use std::sync::Arc;

use axum::response::sse::Event;
use hooks_viewer_core::{SendError, Subscriber, SubscriberId};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use super::feed::LiveFeed;

/// Events buffered per client before it counts as too slow.
pub const SUBSCRIBER_QUEUE: usize = 64;

#[derive(Debug)]
struct Frame {
    event: String,
    payload: String,
}

pub struct SseSubscriber {
    tx: mpsc::Sender<Frame>,
    closed: CancellationToken,
}

/// Receiving half of an [`SseSubscriber`].
pub struct SseReceiver {
    rx: mpsc::Receiver<Frame>,
    closed: CancellationToken,
}

impl SseSubscriber {
    pub fn channel(capacity: usize) -> (Arc<Self>, SseReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        let closed = CancellationToken::new();
        let sub = Arc::new(Self {
            tx,
            closed: closed.clone(),
        });
        (sub, SseReceiver { rx, closed })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl Subscriber for SseSubscriber {
    fn send(&self, event: &str, payload: &str) -> Result<(), SendError> {
        if self.closed.is_cancelled() {
            return Err(SendError::Closed);
        }
        self.tx
            .try_send(Frame {
                event: event.to_string(),
                payload: payload.to_string(),
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SendError::Full,
                mpsc::error::TrySendError::Closed(_) => SendError::Closed,
            })
    }

    fn close(&self) {
        self.closed.cancel();
    }
}

/// Unregisters a subscriber when its response stream is dropped.
pub struct SubscriptionGuard {
    feed: Arc<LiveFeed>,
    id: SubscriberId,
}

impl SubscriptionGuard {
    pub fn new(feed: Arc<LiveFeed>, id: SubscriberId) -> Self {
        Self { feed, id }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        tracing::debug!(subscriber_id = self.id, "Stream client disconnected");
        self.feed.disconnect(self.id);
    }
}

/// Turn queued frames into SSE events. The stream ends once the subscriber
/// is closed and its queue has drained.
pub fn event_stream(
    receiver: SseReceiver,
    guard: SubscriptionGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let SseReceiver { mut rx, closed } = receiver;
    async_stream::stream! {
        let _guard = guard;
        loop {
            tokio::select! {
                biased;
                frame = rx.recv() => match frame {
                    Some(Frame { event, payload }) => {
                        yield Ok(Event::default().event(event).data(payload));
                    }
                    None => break,
                },
                _ = closed.cancelled() => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_queue_reports_full() {
        let (sub, _rx) = SseSubscriber::channel(1);
        assert_eq!(sub.send("entries", "[]"), Ok(()));
        assert_eq!(sub.send("entries", "[]"), Err(SendError::Full));
    }

    #[test]
    fn test_dropped_receiver_reports_closed() {
        let (sub, rx) = SseSubscriber::channel(4);
        drop(rx);
        assert_eq!(sub.send("entries", "[]"), Err(SendError::Closed));
    }

    #[test]
    fn test_send_after_close_fails() {
        let (sub, _rx) = SseSubscriber::channel(4);
        sub.close();
        assert!(sub.is_closed());
        assert_eq!(sub.send("entries", "[]"), Err(SendError::Closed));
    }

    #[tokio::test]
    async fn test_stream_drains_then_ends_on_close() {
        use tokio_stream::StreamExt;

        let feed = Arc::new(LiveFeed::new("/nonexistent/hooks-log.txt"));
        let (sub, rx) = SseSubscriber::channel(4);
        sub.send("entries", "[1]").unwrap();
        sub.send("entries", "[1,2]").unwrap();
        sub.close();

        let stream = event_stream(rx, SubscriptionGuard::new(feed, 0));
        tokio::pin!(stream);
        let mut count = 0;
        while let Some(item) = stream.next().await {
            assert!(item.is_ok());
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
