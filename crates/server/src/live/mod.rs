//! Live log streaming: the shared feed and its SSE transport.

pub mod feed;
pub mod sse;

pub use feed::{LiveFeed, ENTRIES_EVENT};
pub use sse::{event_stream, SseSubscriber, SubscriptionGuard, SUBSCRIBER_QUEUE};
