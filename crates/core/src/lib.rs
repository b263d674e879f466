// crates/core/src/lib.rs
pub mod error;
pub mod rate_limit;
pub mod record;
pub mod registry;
pub mod watcher;

pub use error::*;
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use record::{parse_chunk, parse_records, read_all_records, LogRecord, ParsedChunk};
pub use registry::{BroadcastReport, Subscriber, SubscriberId, SubscriberRegistry};
pub use watcher::{ChangeOutcome, LogBatch, LogWatcher, WatcherConfig};
