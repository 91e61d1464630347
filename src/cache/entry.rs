//! Cache Entry Module
//!
//! Defines the state-holding record for one key of the request cache.

use serde::Serialize;
use tokio::time::Instant;

use crate::cache::WaitHandle;

// == Entry Status ==
/// Lifecycle status of a cache entry.
///
/// `Pending -> Resolved` is terminal. A failed fetch removes its entry in the
/// same critical section, so a rejected entry is never observable in the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Resolved,
}

/// The status together with the data only that status carries.
#[derive(Debug)]
pub enum EntryState<V> {
    /// A fetch is in flight; other callers subscribe through the handle
    Pending(WaitHandle<V>),
    /// The fetch succeeded
    Resolved(V),
}

// == Cache Entry ==
/// A single key's in-flight or completed fetch outcome.
#[derive(Debug)]
pub struct CacheEntry<K, V> {
    key: K,
    state: EntryState<V>,
    /// Creation time, refreshed when the fetch resolves
    created_at: Instant,
    /// Orders entries that share an instant; refreshed with `created_at`
    stamp: u64,
    /// Identifies the flight that created this entry
    flight_id: u64,
    correlation_id: String,
}

impl<K, V> CacheEntry<K, V> {
    // == Constructor ==
    /// Creates a pending entry for a freshly started flight.
    ///
    /// The flight id doubles as the initial stamp.
    pub fn pending(
        key: K,
        waiters: WaitHandle<V>,
        created_at: Instant,
        flight_id: u64,
        correlation_id: String,
    ) -> Self {
        Self {
            key,
            state: EntryState::Pending(waiters),
            created_at,
            stamp: flight_id,
            flight_id,
            correlation_id,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn state(&self) -> &EntryState<V> {
        &self.state
    }

    pub fn status(&self) -> EntryStatus {
        match self.state {
            EntryState::Pending(_) => EntryStatus::Pending,
            EntryState::Resolved(_) => EntryStatus::Resolved,
        }
    }

    /// Returns the value when resolved.
    pub fn value(&self) -> Option<&V> {
        match &self.state {
            EntryState::Resolved(value) => Some(value),
            EntryState::Pending(_) => None,
        }
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    pub fn flight_id(&self) -> u64 {
        self.flight_id
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Ordering key for age-based eviction: oldest first.
    pub fn age_order(&self) -> (Instant, u64) {
        (self.created_at, self.stamp)
    }

    // == Resolve ==
    /// Moves a pending entry to `Resolved` and refreshes its creation time.
    ///
    /// Returns false, leaving the entry untouched, if it was not pending.
    pub fn resolve(&mut self, value: V, now: Instant, stamp: u64) -> bool {
        if !matches!(self.state, EntryState::Pending(_)) {
            return false;
        }
        self.state = EntryState::Resolved(value);
        self.created_at = now;
        self.stamp = stamp;
        true
    }
}
