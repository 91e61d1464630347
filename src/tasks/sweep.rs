//! Expiry Sweep Task
//!
//! Background task that periodically removes entries older than the cache TTL.
//! The cache itself only expires entries lazily; this task is opt-in.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CacheKey, CacheValue, RequestCache};

/// Spawns a background task that sweeps the cache at a fixed interval.
///
/// Each run removes every entry created more than the cache's TTL ago,
/// whatever its status.
///
/// # Arguments
/// * `cache` - The cache to sweep; the task holds a clone of the handle
/// * `interval` - Time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = RequestCache::<String, u32>::new(CacheConfig::default());
/// let sweep_handle = spawn_sweep_task(cache.clone(), Duration::from_secs(30));
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task<K, V>(cache: RequestCache<K, V>, interval: Duration) -> JoinHandle<()>
where
    K: CacheKey,
    V: CacheValue,
{
    let max_age = cache.config().ttl;

    tokio::spawn(async move {
        info!(
            "Starting expiry sweep task with interval of {}ms",
            interval.as_millis()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.clear_expired(max_age);
            if removed > 0 {
                info!("Expiry sweep: removed {} entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}
