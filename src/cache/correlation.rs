//! Correlation Tracker Module
//!
//! Issues opaque identifiers that tie together every event of one fetch.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

// == Correlation Tracker ==
/// Issues ids of the form `{operation}-{epoch_ms_hex}-{sequence}`.
///
/// The sequence is monotonic per tracker, so ids are unique within a process
/// even when issued in the same millisecond.
#[derive(Debug)]
pub struct CorrelationTracker {
    operation: String,
    sequence: AtomicU64,
}

impl CorrelationTracker {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Issues the next correlation id.
    pub fn next_id(&self) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!(
            "{}-{:x}-{}",
            self.operation,
            Utc::now().timestamp_millis(),
            sequence
        )
    }

    /// Number of ids issued so far.
    pub fn issued(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl Default for CorrelationTracker {
    fn default() -> Self {
        Self::new("fetch")
    }
}
