//! Eviction Policy Module
//!
//! Picks the entry to remove when the cache is at capacity. Entries are
//! ordered by age (FIFO by `created_at`), not by access.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use serde::Serialize;

use crate::cache::{CacheEntry, EntryStatus};

// == Eviction Mode ==
/// Which entry gives way when a new key arrives at a full cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionMode {
    /// Oldest entry regardless of status. An evicted pending fetch still
    /// completes and notifies its waiters, but its result is not stored.
    #[default]
    Immediate,
    /// Oldest resolved entry; a pending entry is chosen only when every
    /// entry is pending.
    PreferResolved,
}

impl fmt::Display for EvictionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionMode::Immediate => f.write_str("immediate"),
            EvictionMode::PreferResolved => f.write_str("prefer-resolved"),
        }
    }
}

impl FromStr for EvictionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "immediate" => Ok(EvictionMode::Immediate),
            "prefer-resolved" | "prefer_resolved" => Ok(EvictionMode::PreferResolved),
            other => Err(format!("unknown eviction mode: {}", other)),
        }
    }
}

// == Eviction Policy ==
/// Age-based victim selection, O(n) over the entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvictionPolicy {
    mode: EvictionMode,
}

impl EvictionPolicy {
    pub fn new(mode: EvictionMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> EvictionMode {
        self.mode
    }

    // == Select Victim ==
    /// Returns the key of the entry to evict, or None if there are no entries.
    pub fn select_victim<K, V>(&self, entries: &HashMap<K, CacheEntry<K, V>>) -> Option<K>
    where
        K: Clone + Eq + Hash,
    {
        let oldest_resolved = match self.mode {
            EvictionMode::Immediate => None,
            EvictionMode::PreferResolved => entries
                .values()
                .filter(|entry| entry.status() == EntryStatus::Resolved)
                .min_by_key(|entry| entry.age_order()),
        };

        oldest_resolved
            .or_else(|| entries.values().min_by_key(|entry| entry.age_order()))
            .map(|entry| entry.key().clone())
    }
}
