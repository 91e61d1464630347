//! Cache Events Module
//!
//! Discrete observability events emitted by the request cache, and the sink
//! trait that receives them.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

// == Event Kind ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEventKind {
    CacheHit,
    CacheMiss,
    FetchSuccess,
    FetchError,
    Eviction,
    Expiry,
}

impl CacheEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CacheHit => "cache-hit",
            Self::CacheMiss => "cache-miss",
            Self::FetchSuccess => "fetch-success",
            Self::FetchError => "fetch-error",
            Self::Eviction => "eviction",
            Self::Expiry => "expiry",
        }
    }
}

// == Cache Event ==
/// One observability event, tagged with the correlation id of its flight.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEvent {
    pub kind: CacheEventKind,
    pub key: String,
    pub correlation_id: String,
    /// Fetch duration, set on `fetch-success` and `fetch-error`
    pub duration: Option<Duration>,
    /// Error message, set on `fetch-error`
    pub error: Option<String>,
}

impl CacheEvent {
    pub fn new(kind: CacheEventKind, key: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
            correlation_id: correlation_id.into(),
            duration: None,
            error: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

// == Observer ==
/// Receives cache events synchronously, after the cache lock is released.
///
/// Implementations must not panic; failures inside a sink are the sink's to
/// handle.
pub trait CacheObserver: Send + Sync {
    fn on_event(&self, event: &CacheEvent);
}

impl<T: CacheObserver + ?Sized> CacheObserver for Arc<T> {
    fn on_event(&self, event: &CacheEvent) {
        (**self).on_event(event)
    }
}

/// Default observer: structured `tracing` output per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CacheObserver for TracingObserver {
    fn on_event(&self, event: &CacheEvent) {
        let duration_ms = event.duration.map(|d| d.as_millis() as u64);
        match event.kind {
            CacheEventKind::CacheHit | CacheEventKind::CacheMiss => debug!(
                event = event.kind.as_str(),
                key = %event.key,
                correlation_id = %event.correlation_id,
                "cache lookup"
            ),
            CacheEventKind::FetchSuccess => debug!(
                event = event.kind.as_str(),
                key = %event.key,
                correlation_id = %event.correlation_id,
                duration_ms,
                "fetch completed"
            ),
            CacheEventKind::FetchError => warn!(
                event = event.kind.as_str(),
                key = %event.key,
                correlation_id = %event.correlation_id,
                duration_ms,
                error = event.error.as_deref().unwrap_or_default(),
                "fetch failed"
            ),
            CacheEventKind::Eviction | CacheEventKind::Expiry => info!(
                event = event.kind.as_str(),
                key = %event.key,
                correlation_id = %event.correlation_id,
                "entry removed"
            ),
        }
    }
}

/// Observer that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<CacheEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the events seen so far.
    pub fn events(&self) -> Vec<CacheEvent> {
        self.events.lock().clone()
    }

    /// Counts events of one kind.
    pub fn count(&self, kind: CacheEventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }
}

impl CacheObserver for RecordingObserver {
    fn on_event(&self, event: &CacheEvent) {
        self.events.lock().push(event.clone());
    }
}
