//! Cache Module
//!
//! Concurrent memoizing request cache: single-flight fetches, lazy TTL
//! expiry, age-based eviction, correlation ids and statistics snapshots.

mod correlation;
mod entry;
mod eviction;
mod events;
mod expiration;
pub(crate) mod flight;
mod stats;
mod store;


// Re-export public types
pub use correlation::CorrelationTracker;
pub use entry::{CacheEntry, EntryState, EntryStatus};
pub use eviction::{EvictionMode, EvictionPolicy};
pub use events::{CacheEvent, CacheEventKind, CacheObserver, RecordingObserver, TracingObserver};
pub use expiration::{is_older_than, ExpirationPolicy};
pub use flight::{Suspense, WaitHandle};
pub use stats::{
    json_size, CacheCounters, CacheStatistics, EntrySnapshot, Sizer, StatisticsCollector,
    FALLBACK_VALUE_SIZE,
};
pub use store::{CacheKey, CacheValue, RequestCache, RequestCacheBuilder};
