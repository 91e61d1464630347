//! Request Cache Module
//!
//! Main cache engine: a key→entry map guarded by one mutex, single-flight
//! fetches spawned outside the lock, lazy TTL expiry and age-based eviction.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::cache::correlation::CorrelationTracker;
use crate::cache::events::{CacheEvent, CacheEventKind, CacheObserver, TracingObserver};
use crate::cache::expiration::{is_older_than, ExpirationPolicy};
use crate::cache::flight::{self, FlightSender};
use crate::cache::stats::{json_size, EntryCopy, Sizer, StatisticsCollector};
use crate::cache::{
    CacheCounters, CacheEntry, CacheStatistics, EntryState, EntryStatus, EvictionPolicy, Suspense,
    WaitHandle,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Key bound for a request cache.
///
/// `Display` is the key's serialized form, used in logs, events and errors.
pub trait CacheKey: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static {}

/// Value bound for a request cache.
pub trait CacheValue: Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Send + Sync + 'static {}

/// Outcome of a lookup made under the lock.
enum Lookup<V> {
    Ready(V),
    Waiting(WaitHandle<V>),
}

/// A flight registered in the map whose fetch has not been started yet.
struct NewFlight<V> {
    flight_id: u64,
    correlation_id: String,
    sender: FlightSender<V>,
}

// == Cache State ==
/// Everything guarded by the cache-wide lock.
struct CacheState<K, V> {
    entries: HashMap<K, CacheEntry<K, V>>,
    counters: CacheCounters,
    next_stamp: u64,
}

impl<K, V> CacheState<K, V> {
    fn next_stamp(&mut self) -> u64 {
        self.next_stamp += 1;
        self.next_stamp
    }
}

struct Inner<K, V> {
    state: Mutex<CacheState<K, V>>,
    config: CacheConfig,
    expiration: ExpirationPolicy,
    eviction: EvictionPolicy,
    correlation: CorrelationTracker,
    collector: StatisticsCollector<V>,
    observer: Option<Arc<dyn CacheObserver>>,
    runtime: Handle,
}

// == Request Cache ==
/// Concurrent memoizing cache for the outcomes of fetch functions.
///
/// Cloning is cheap; clones share the same map. Build one instance per logical
/// cache domain at startup and hand it to the consumers that need it.
pub struct RequestCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for RequestCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> fmt::Debug for RequestCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCache")
            .field("config", &self.inner.config)
            .field("len", &self.inner.state.lock().entries.len())
            .finish_non_exhaustive()
    }
}

// == Builder ==
/// Assembles a [`RequestCache`].
pub struct RequestCacheBuilder<K, V> {
    config: CacheConfig,
    operation: String,
    observer: Option<Arc<dyn CacheObserver>>,
    sizer: Option<Sizer<V>>,
    runtime: Option<Handle>,
    _key: PhantomData<fn() -> K>,
}

impl<K: CacheKey, V: CacheValue> RequestCacheBuilder<K, V> {
    /// Prefix of the correlation ids this cache issues (default: `fetch`).
    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    /// Replaces the default tracing observer.
    pub fn observer(mut self, observer: impl CacheObserver + 'static) -> Self {
        let observer: Arc<dyn CacheObserver> = Arc::new(observer);
        self.observer = Some(observer);
        self
    }

    /// Sets how values are measured for the memory estimate.
    pub fn sizer(mut self, sizer: impl Fn(&V) -> Option<usize> + Send + Sync + 'static) -> Self {
        self.sizer = Some(Arc::new(sizer));
        self
    }

    /// Measures values by their JSON encoding.
    pub fn json_sizer(self) -> Self
    where
        V: Serialize,
    {
        self.sizer(|value: &V| json_size(value))
    }

    /// Runtime on which fetches are spawned.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Builds the cache.
    ///
    /// # Panics
    /// Panics if no runtime was given and this is called outside a tokio runtime.
    pub fn build(mut self) -> RequestCache<K, V> {
        self.config.max_size = self.config.max_size.max(1);
        let runtime = self.runtime.unwrap_or_else(Handle::current);
        let observer = if self.config.enable_metrics {
            Some(
                self.observer
                    .unwrap_or_else(|| Arc::new(TracingObserver) as Arc<dyn CacheObserver>),
            )
        } else {
            None
        };

        RequestCache {
            inner: Arc::new(Inner {
                state: Mutex::new(CacheState {
                    entries: HashMap::new(),
                    counters: CacheCounters::new(),
                    next_stamp: 0,
                }),
                expiration: ExpirationPolicy::new(self.config.ttl),
                eviction: EvictionPolicy::new(self.config.eviction_mode),
                correlation: CorrelationTracker::new(self.operation),
                collector: StatisticsCollector::new(self.sizer),
                observer,
                runtime,
                config: self.config,
            }),
        }
    }
}

impl<K: CacheKey, V: CacheValue> RequestCache<K, V> {
    // == Constructors ==
    /// Creates a cache on the current tokio runtime with the tracing observer.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime; use [`RequestCache::builder`]
    /// with an explicit runtime handle instead.
    pub fn new(config: CacheConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: CacheConfig) -> RequestCacheBuilder<K, V> {
        RequestCacheBuilder {
            config,
            operation: "fetch".to_string(),
            observer: None,
            sizer: None,
            runtime: None,
            _key: PhantomData,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    // == Get Or Fetch ==
    /// Returns the value for `key`, fetching it if absent or expired.
    ///
    /// Concurrent callers for the same key share one fetch and observe the same
    /// outcome. The fetch runs on the runtime and completes even if every
    /// caller stops waiting. Failed fetches are not cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, fetch: F) -> Result<V>
    where
        F: FnOnce(K, String) -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync + 'static>> + Send + 'static,
    {
        match self.lookup_or_start(key, fetch)? {
            Lookup::Ready(value) => Ok(value),
            Lookup::Waiting(handle) => handle.wait().await,
        }
    }

    // == Get Or Suspend ==
    /// Synchronous read with the same single-flight semantics.
    ///
    /// Never blocks. While the fetch runs, returns [`Suspense::Pending`] with a
    /// handle to wait on before reading again.
    pub fn get_or_suspend<F, Fut, E>(&self, key: K, fetch: F) -> Suspense<V>
    where
        F: FnOnce(K, String) -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync + 'static>> + Send + 'static,
    {
        match self.lookup_or_start(key, fetch) {
            Ok(Lookup::Ready(value)) => Suspense::Ready(value),
            Ok(Lookup::Waiting(handle)) => handle.into_suspense(),
            Err(err) => Suspense::Failed(err),
        }
    }

    // == Refresh ==
    /// Drops the current entry for `key` and fetches it again.
    ///
    /// A caller racing in between the two steps shares the new fetch.
    pub async fn refresh<F, Fut, E>(&self, key: K, fetch: F) -> Result<V>
    where
        F: FnOnce(K, String) -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync + 'static>> + Send + 'static,
    {
        self.clear(Some(&key));
        self.get_or_fetch(key, fetch).await
    }

    // == Peek ==
    /// Returns the resolved, fresh value without fetching or mutating anything.
    pub fn peek(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let state = self.inner.state.lock();
        state
            .entries
            .get(key)
            .filter(|entry| !self.is_stale(entry, now))
            .and_then(|entry| entry.value().cloned())
    }

    /// Returns true if a live (pending or fresh) entry exists for `key`.
    pub fn exists(&self, key: &K) -> bool {
        self.entry_status(key).is_some()
    }

    /// Returns true if `key` holds a fresh resolved value.
    pub fn has_resolved(&self, key: &K) -> bool {
        self.entry_status(key) == Some(EntryStatus::Resolved)
    }

    /// Status of the live entry for `key`; None when missing or stale.
    pub fn entry_status(&self, key: &K) -> Option<EntryStatus> {
        let now = Instant::now();
        let state = self.inner.state.lock();
        state
            .entries
            .get(key)
            .filter(|entry| !self.is_stale(entry, now))
            .map(|entry| entry.status())
    }

    /// Number of entries in the map, stale ones included until swept.
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Clear ==
    /// Removes one key, or every entry when `key` is None.
    ///
    /// Pending fetches of removed entries still complete; their results are
    /// delivered to waiters but not stored. Returns the number removed.
    pub fn clear(&self, key: Option<&K>) -> usize {
        let removed = {
            let mut state = self.inner.state.lock();
            match key {
                Some(key) => usize::from(state.entries.remove(key).is_some()),
                None => {
                    let count = state.entries.len();
                    state.entries.clear();
                    count
                }
            }
        };
        match key {
            Some(key) => debug!("Cleared key '{}' ({} removed)", key, removed),
            None => debug!("Cleared all {} entries", removed),
        }
        removed
    }

    /// Removes every listed key; returns the number actually removed.
    pub fn clear_multiple<'a, I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = &'a K>,
    {
        let mut state = self.inner.state.lock();
        keys.into_iter()
            .filter(|key| state.entries.remove(*key).is_some())
            .count()
    }

    // == Clear Expired ==
    /// Removes every entry, whatever its status, created more than `max_age` ago.
    pub fn clear_expired(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut events = Vec::new();
        {
            let mut state = self.inner.state.lock();
            let expired: Vec<K> = state
                .entries
                .values()
                .filter(|entry| is_older_than(entry.created_at(), now, max_age))
                .map(|entry| entry.key().clone())
                .collect();

            for key in expired {
                if let Some(entry) = state.entries.remove(&key) {
                    state.counters.record_expiration();
                    events.push(CacheEvent::new(
                        CacheEventKind::Expiry,
                        key.to_string(),
                        entry.correlation_id(),
                    ));
                }
            }
        }

        let count = events.len();
        self.emit(events);
        count
    }

    // == Stats ==
    /// Returns a snapshot of the cache; never mutates it.
    pub fn stats(&self) -> CacheStatistics {
        let now = Instant::now();
        let (copies, counters) = {
            let state = self.inner.state.lock();
            let copies: Vec<EntryCopy<V>> = state
                .entries
                .values()
                .map(|entry| EntryCopy {
                    key: entry.key().to_string(),
                    status: entry.status(),
                    correlation_id: entry.correlation_id().to_string(),
                    age: now.saturating_duration_since(entry.created_at()),
                    value: entry.value().cloned(),
                })
                .collect();
            (copies, state.counters.clone())
        };

        self.inner
            .collector
            .collect(copies, counters, self.inner.config.max_size)
    }

    // == Internals ==
    /// Resolved entries go stale after the TTL. A pending entry is never
    /// stale by age, only once its flight ended without updating the map.
    fn is_stale(&self, entry: &CacheEntry<K, V>, now: Instant) -> bool {
        match entry.state() {
            EntryState::Pending(handle) => handle.is_settled(),
            EntryState::Resolved(_) => self.inner.expiration.is_stale(entry.created_at(), now),
        }
    }

    fn lookup_or_start<F, Fut, E>(&self, key: K, fetch: F) -> Result<Lookup<V>>
    where
        F: FnOnce(K, String) -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync + 'static>> + Send + 'static,
    {
        let now = Instant::now();
        let mut events = Vec::new();

        let started = {
            let mut state = self.inner.state.lock();
            match self.join_existing(&mut state, &key, now, &mut events) {
                Some(lookup) => Ok((lookup, None)),
                None => self
                    .register_flight(&mut state, &key, now, &mut events)
                    .map(|(handle, flight)| (Lookup::Waiting(handle), Some(flight))),
            }
        };
        self.emit(events);

        let (lookup, flight) = started?;
        if let Some(flight) = flight {
            let correlation_id = flight.correlation_id.clone();
            let future = fetch(key.clone(), correlation_id);
            self.spawn_flight(key, flight, future);
        }
        Ok(lookup)
    }

    /// Answers from a live entry, or removes a stale or abandoned one and
    /// returns None.
    fn join_existing(
        &self,
        state: &mut CacheState<K, V>,
        key: &K,
        now: Instant,
        events: &mut Vec<CacheEvent>,
    ) -> Option<Lookup<V>> {
        let entry = state.entries.get(key)?;
        let correlation_id = entry.correlation_id().to_string();

        let lookup = match entry.state() {
            EntryState::Pending(handle) if !handle.is_settled() => {
                state.counters.record_coalesced();
                Some(Lookup::Waiting(handle.clone()))
            }
            EntryState::Resolved(value) if !self.inner.expiration.is_stale(entry.created_at(), now) => {
                let value = value.clone();
                state.counters.record_hit();
                Some(Lookup::Ready(value))
            }
            EntryState::Resolved(_) => {
                state.entries.remove(key);
                state.counters.record_expiration();
                events.push(CacheEvent::new(CacheEventKind::Expiry, key.to_string(), &correlation_id));
                return None;
            }
            EntryState::Pending(_) => {
                // The fetch closure panicked or the driver task was cancelled.
                state.entries.remove(key);
                warn!("Dropped abandoned flight for key '{}' [{}]", key, correlation_id);
                return None;
            }
        };

        events.push(CacheEvent::new(CacheEventKind::CacheHit, key.to_string(), correlation_id));
        lookup
    }

    /// Makes room, then inserts a pending entry for a new flight.
    fn register_flight(
        &self,
        state: &mut CacheState<K, V>,
        key: &K,
        now: Instant,
        events: &mut Vec<CacheEvent>,
    ) -> Result<(WaitHandle<V>, NewFlight<V>)> {
        let max_size = self.inner.config.max_size;
        while state.entries.len() >= max_size {
            let Some(victim) = self.inner.eviction.select_victim(&state.entries) else {
                break;
            };
            if let Some(evicted) = state.entries.remove(&victim) {
                state.counters.record_eviction();
                if evicted.status() == EntryStatus::Pending {
                    debug!(
                        "Evicted pending key '{}' [{}]; its result will be discarded",
                        victim,
                        evicted.correlation_id()
                    );
                }
                events.push(CacheEvent::new(
                    CacheEventKind::Eviction,
                    victim.to_string(),
                    evicted.correlation_id(),
                ));
            }
        }

        if state.entries.len() >= max_size {
            error!(
                "Eviction left {} entries with max_size {}",
                state.entries.len(),
                max_size
            );
            return Err(CacheError::CapacityInvariant {
                len: state.entries.len(),
                max_size,
            });
        }

        let flight_id = state.next_stamp();
        let correlation_id = self.inner.correlation.next_id();
        let (sender, handle) = flight::channel(key.to_string(), correlation_id.clone());
        state.entries.insert(
            key.clone(),
            CacheEntry::pending(key.clone(), handle.clone(), now, flight_id, correlation_id.clone()),
        );
        state.counters.record_miss();
        events.push(CacheEvent::new(CacheEventKind::CacheMiss, key.to_string(), &correlation_id));

        Ok((
            handle,
            NewFlight {
                flight_id,
                correlation_id,
                sender,
            },
        ))
    }

    /// Drives one fetch to completion on the runtime.
    ///
    /// The fetch runs in its own task so a panic is observed as a `JoinError`
    /// rather than tearing down the driver.
    fn spawn_flight<Fut, E>(&self, key: K, flight: NewFlight<V>, future: Fut)
    where
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync + 'static>> + Send + 'static,
    {
        let cache = self.clone();
        let runtime = self.inner.runtime.clone();

        self.inner.runtime.spawn(async move {
            let started = Instant::now();
            let outcome = match runtime.spawn(future).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(CacheError::fetch(key.to_string(), &flight.correlation_id, err)),
                Err(join_error) => {
                    warn!(
                        "Fetch task for key '{}' [{}] did not complete: {}",
                        key, flight.correlation_id, join_error
                    );
                    Err(CacheError::Abandoned {
                        key: key.to_string(),
                        correlation_id: flight.correlation_id.clone(),
                    })
                }
            };

            // Update the map before waking waiters so they observe the outcome.
            cache.complete(&key, flight.flight_id, &flight.correlation_id, &outcome, started.elapsed());
            flight.sender.settle(outcome);
        });
    }

    /// Applies a finished fetch to its entry, if the entry is still that flight's.
    fn complete(
        &self,
        key: &K,
        flight_id: u64,
        correlation_id: &str,
        outcome: &Result<V>,
        elapsed: Duration,
    ) {
        let event = {
            let mut state = self.inner.state.lock();
            let stamp = state.next_stamp();
            let CacheState {
                entries, counters, ..
            } = &mut *state;
            let owned = entries
                .get(key)
                .is_some_and(|entry| entry.flight_id() == flight_id);

            match outcome {
                Ok(value) => {
                    counters.record_fetch_success();
                    match entries.get_mut(key).filter(|_| owned) {
                        Some(entry) => {
                            entry.resolve(value.clone(), Instant::now(), stamp);
                        }
                        None => {
                            counters.record_discarded();
                            debug!("Discarded result for key '{}' [{}]", key, correlation_id);
                        }
                    }
                    CacheEvent::new(CacheEventKind::FetchSuccess, key.to_string(), correlation_id)
                        .with_duration(elapsed)
                }
                Err(err) => {
                    counters.record_fetch_error();
                    if owned {
                        entries.remove(key);
                    }
                    CacheEvent::new(CacheEventKind::FetchError, key.to_string(), correlation_id)
                        .with_duration(elapsed)
                        .with_error(err.to_string())
                }
            }
        };
        self.emit(vec![event]);
    }

    /// Dispatches events to the observer; called with the lock released.
    fn emit(&self, events: Vec<CacheEvent>) {
        if let Some(observer) = &self.inner.observer {
            for event in &events {
                observer.on_event(event);
            }
        }
    }
}
