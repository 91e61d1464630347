//! Expiration Policy Module
//!
//! Decides entry staleness from a creation timestamp and a TTL.

use std::time::Duration;

use tokio::time::Instant;

// == Expiration Policy ==
/// TTL-based staleness check, applied lazily on access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    ttl: Duration,
}

impl ExpirationPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // == Is Stale ==
    /// Returns true when strictly more than the TTL has elapsed since `created_at`.
    pub fn is_stale(&self, created_at: Instant, now: Instant) -> bool {
        is_older_than(created_at, now, self.ttl)
    }

    /// Remaining lifetime of an entry created at `created_at`, zero once stale.
    pub fn remaining(&self, created_at: Instant, now: Instant) -> Duration {
        self.ttl.saturating_sub(now.saturating_duration_since(created_at))
    }
}

/// Returns true when `now - created_at > max_age`.
///
/// A `created_at` in the future counts as age zero.
pub fn is_older_than(created_at: Instant, now: Instant, max_age: Duration) -> bool {
    now.saturating_duration_since(created_at) > max_age
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_entry_not_stale() {
        let policy = ExpirationPolicy::new(Duration::from_millis(100));
        let now = Instant::now();

        assert!(!policy.is_stale(now, now));
        assert!(!policy.is_stale(now, now + Duration::from_millis(50)));
    }

    #[test]
    fn test_stale_after_ttl() {
        let policy = ExpirationPolicy::new(Duration::from_millis(100));
        let created = Instant::now();

        assert!(policy.is_stale(created, created + Duration::from_millis(150)));
    }

    #[test]
    fn test_boundary_is_not_stale() {
        // Staleness requires strictly more than the TTL.
        let policy = ExpirationPolicy::new(Duration::from_millis(100));
        let created = Instant::now();

        assert!(!policy.is_stale(created, created + Duration::from_millis(100)));
        assert!(policy.is_stale(created, created + Duration::from_millis(101)));
    }

    #[test]
    fn test_future_created_at_counts_as_fresh() {
        let now = Instant::now();
        assert!(!is_older_than(now + Duration::from_secs(1), now, Duration::ZERO));
    }

    #[test]
    fn test_remaining() {
        let policy = ExpirationPolicy::new(Duration::from_millis(100));
        let created = Instant::now();

        assert_eq!(
            policy.remaining(created, created + Duration::from_millis(40)),
            Duration::from_millis(60)
        );
        assert_eq!(
            policy.remaining(created, created + Duration::from_millis(400)),
            Duration::ZERO
        );
    }
}
