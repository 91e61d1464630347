//! Cache Statistics Module
//!
//! Cumulative counters plus a read-only, point-in-time snapshot of the entries
//! for diagnostics.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::EntryStatus;

/// Size assumed for a value the sizer cannot measure.
pub const FALLBACK_VALUE_SIZE: usize = 256;

/// Measures a value in bytes, or returns None when it cannot.
pub type Sizer<V> = Arc<dyn Fn(&V) -> Option<usize> + Send + Sync>;

/// Sizes a value by the length of its JSON encoding.
pub fn json_size<V: Serialize>(value: &V) -> Option<usize> {
    serde_json::to_vec(value).ok().map(|bytes| bytes.len())
}

// == Cache Counters ==
/// Cumulative performance counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheCounters {
    /// Lookups answered by a fresh resolved entry
    pub hits: u64,
    /// Lookups that started a new fetch
    pub misses: u64,
    /// Lookups that joined a fetch already in flight
    pub coalesced: u64,
    /// Entries removed to make room
    pub evictions: u64,
    /// Entries removed because their TTL or sweep age elapsed
    pub expirations: u64,
    pub fetch_successes: u64,
    pub fetch_errors: u64,
    /// Fetches that completed after their entry was evicted or replaced
    pub discarded: u64,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Share of lookups that did not start a fetch, or 0.0 with no lookups.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.coalesced;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_coalesced(&mut self) {
        self.coalesced += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    pub fn record_fetch_success(&mut self) {
        self.fetch_successes += 1;
    }

    pub fn record_fetch_error(&mut self) {
        self.fetch_errors += 1;
    }

    pub fn record_discarded(&mut self) {
        self.discarded += 1;
    }
}

// == Entry Snapshot ==
/// One entry as seen by a statistics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySnapshot {
    pub key: String,
    pub status: EntryStatus,
    pub correlation_id: String,
    pub age_ms: u64,
    pub estimated_bytes: usize,
}

// == Cache Statistics ==
/// Point-in-time view of the cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatistics {
    pub generated_at: DateTime<Utc>,
    pub size: usize,
    pub max_size: usize,
    pub pending: usize,
    pub resolved: usize,
    pub estimated_memory_bytes: usize,
    pub average_age_ms: f64,
    pub min_age_ms: Option<u64>,
    pub max_age_ms: Option<u64>,
    pub hit_rate: f64,
    pub counters: CacheCounters,
    /// Entries, oldest first
    pub entries: Vec<EntrySnapshot>,
}

impl CacheStatistics {
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| entry.key == key)
    }
}

// == Statistics Collector ==
/// An entry copied out of the map under the lock, sized afterwards.
#[derive(Debug)]
pub(crate) struct EntryCopy<V> {
    pub key: String,
    pub status: EntryStatus,
    pub correlation_id: String,
    pub age: Duration,
    pub value: Option<V>,
}

/// Turns entry copies into a [`CacheStatistics`] snapshot.
pub struct StatisticsCollector<V> {
    sizer: Option<Sizer<V>>,
}

impl<V> fmt::Debug for StatisticsCollector<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatisticsCollector")
            .field("sizer", &self.sizer.is_some())
            .finish()
    }
}

impl<V> Default for StatisticsCollector<V> {
    fn default() -> Self {
        Self { sizer: None }
    }
}

impl<V> StatisticsCollector<V> {
    pub fn new(sizer: Option<Sizer<V>>) -> Self {
        Self { sizer }
    }

    /// Estimated footprint of one entry: key plus value, if resolved.
    fn estimate(&self, copy: &EntryCopy<V>) -> usize {
        let payload = copy.value.as_ref().map_or(0, |value| {
            self.sizer
                .as_ref()
                .and_then(|sizer| sizer(value))
                .unwrap_or(FALLBACK_VALUE_SIZE)
        });
        copy.key.len() + payload
    }

    pub(crate) fn collect(
        &self,
        mut copies: Vec<EntryCopy<V>>,
        counters: CacheCounters,
        max_size: usize,
    ) -> CacheStatistics {
        copies.sort_by(|a, b| b.age.cmp(&a.age).then_with(|| a.key.cmp(&b.key)));

        let entries: Vec<EntrySnapshot> = copies
            .iter()
            .map(|copy| EntrySnapshot {
                key: copy.key.clone(),
                status: copy.status,
                correlation_id: copy.correlation_id.clone(),
                age_ms: copy.age.as_millis() as u64,
                estimated_bytes: self.estimate(copy),
            })
            .collect();

        let count_status = |status| entries.iter().filter(|e| e.status == status).count();
        let ages = entries.iter().map(|e| e.age_ms);
        let average_age_ms = if entries.is_empty() {
            0.0
        } else {
            ages.clone().sum::<u64>() as f64 / entries.len() as f64
        };

        CacheStatistics {
            generated_at: Utc::now(),
            size: entries.len(),
            max_size,
            pending: count_status(EntryStatus::Pending),
            resolved: count_status(EntryStatus::Resolved),
            estimated_memory_bytes: entries.iter().map(|e| e.estimated_bytes).sum(),
            average_age_ms,
            min_age_ms: ages.clone().min(),
            max_age_ms: ages.max(),
            hit_rate: counters.hit_rate(),
            counters,
            entries,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn copy(key: &str, status: EntryStatus, age_ms: u64, value: Option<u32>) -> EntryCopy<u32> {
        EntryCopy {
            key: key.to_string(),
            status,
            correlation_id: format!("c-{}", key),
            age: Duration::from_millis(age_ms),
            value,
        }
    }

    #[test]
    fn test_counters_new() {
        let counters = CacheCounters::new();
        assert_eq!(counters.hits, 0);
        assert_eq!(counters.misses, 0);
        assert_eq!(counters.evictions, 0);
        assert_eq!(counters.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_counts_coalesced() {
        let mut counters = CacheCounters::new();
        counters.record_miss();
        counters.record_coalesced();
        counters.record_hit();
        counters.record_hit();

        assert_eq!(counters.hit_rate(), 0.75);
    }

    #[test]
    fn test_hit_rate_all_misses() {
        let mut counters = CacheCounters::new();
        counters.record_miss();
        counters.record_miss();
        assert_eq!(counters.hit_rate(), 0.0);
    }

    #[test]
    fn test_record_removals() {
        let mut counters = CacheCounters::new();
        counters.record_eviction();
        counters.record_eviction();
        counters.record_expiration();
        counters.record_discarded();

        assert_eq!(counters.evictions, 2);
        assert_eq!(counters.expirations, 1);
        assert_eq!(counters.discarded, 1);
    }

    #[test]
    fn test_collect_empty() {
        let collector = StatisticsCollector::<u32>::default();
        let stats = collector.collect(Vec::new(), CacheCounters::new(), 10);

        assert_eq!(stats.size, 0);
        assert_eq!(stats.max_size, 10);
        assert_eq!(stats.average_age_ms, 0.0);
        assert!(stats.min_age_ms.is_none());
        assert!(stats.max_age_ms.is_none());
        assert_eq!(stats.estimated_memory_bytes, 0);
    }

    #[test]
    fn test_collect_aggregates() {
        let collector = StatisticsCollector::<u32>::new(Some(Arc::new(|v: &u32| json_size(v))));
        let copies = vec![
            copy("a", EntryStatus::Resolved, 300, Some(12345)),
            copy("bb", EntryStatus::Pending, 100, None),
            copy("c", EntryStatus::Resolved, 200, Some(7)),
        ];

        let stats = collector.collect(copies, CacheCounters::new(), 5);

        assert_eq!(stats.size, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.resolved, 2);
        assert_eq!(stats.min_age_ms, Some(100));
        assert_eq!(stats.max_age_ms, Some(300));
        assert_eq!(stats.average_age_ms, 200.0);
        // "a" + "12345", "bb" + nothing, "c" + "7"
        assert_eq!(stats.estimated_memory_bytes, (1 + 5) + 2 + (1 + 1));
        // Oldest first
        let keys: Vec<&str> = stats.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "c", "bb"]);
        assert!(stats.contains_key("bb"));
    }

    #[test]
    fn test_unsizable_value_uses_fallback() {
        // Maps with non-string keys cannot be encoded as JSON.
        let collector = StatisticsCollector::<HashMap<(u8, u8), u8>>::new(Some(Arc::new(
            |v: &HashMap<(u8, u8), u8>| json_size(v),
        )));
        let mut value = HashMap::new();
        value.insert((1, 2), 3);
        let copies = vec![EntryCopy {
            key: "k".to_string(),
            status: EntryStatus::Resolved,
            correlation_id: "c".to_string(),
            age: Duration::ZERO,
            value: Some(value),
        }];

        let stats = collector.collect(copies, CacheCounters::new(), 1);
        assert_eq!(stats.estimated_memory_bytes, 1 + FALLBACK_VALUE_SIZE);
    }

    #[test]
    fn test_no_sizer_uses_fallback() {
        let collector = StatisticsCollector::<u32>::default();
        let stats = collector.collect(
            vec![copy("key", EntryStatus::Resolved, 0, Some(1))],
            CacheCounters::new(),
            1,
        );
        assert_eq!(stats.estimated_memory_bytes, 3 + FALLBACK_VALUE_SIZE);
    }

    #[test]
    fn test_statistics_serialize() {
        let collector = StatisticsCollector::<u32>::default();
        let stats = collector.collect(
            vec![copy("a", EntryStatus::Pending, 5, None)],
            CacheCounters::new(),
            2,
        );
        let json = serde_json::to_value(&stats).unwrap();

        assert_eq!(json["size"], 1);
        assert_eq!(json["entries"][0]["status"], "pending");
        assert!(json["generated_at"].is_string());
    }
}
