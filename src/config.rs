//! Configuration Module
//!
//! Handles loading cache and server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::EvictionMode;

/// Default maximum number of entries held by a cache.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Default time-to-live for resolved entries (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

// == Cache Config ==
/// Options recognized by [`RequestCache`](crate::cache::RequestCache).
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of entries (never below 1)
    pub max_size: usize,
    /// Age after which a resolved entry is stale
    pub ttl: Duration,
    /// Whether events are dispatched to the observer
    pub enable_metrics: bool,
    /// Which entry gives way when the cache is full
    pub eviction_mode: EvictionMode,
}

impl CacheConfig {
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size.max(1);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    pub fn with_eviction_mode(mut self, mode: EvictionMode) -> Self {
        self.eviction_mode = mode;
        self
    }

    /// Loads cache options from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Maximum entries (default: 100)
    /// - `CACHE_TTL_MS` - TTL in milliseconds (default: 300000)
    /// - `CACHE_ENABLE_METRICS` - Emit cache events (default: true)
    /// - `CACHE_EVICTION_MODE` - `immediate` or `prefer-resolved` (default: immediate)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_size: env_or("CACHE_MAX_SIZE", DEFAULT_MAX_SIZE).max(1),
            ttl: Duration::from_millis(env_or("CACHE_TTL_MS", defaults.ttl.as_millis() as u64)),
            enable_metrics: env_or("CACHE_ENABLE_METRICS", defaults.enable_metrics),
            eviction_mode: env_or("CACHE_EVICTION_MODE", defaults.eviction_mode),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            ttl: DEFAULT_TTL,
            enable_metrics: true,
            eviction_mode: EvictionMode::Immediate,
        }
    }
}

// == Server Config ==
/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Options for the record cache
    pub cache: CacheConfig,
    /// HTTP server port
    pub server_port: u16,
    /// Background sweep interval in milliseconds, 0 = disabled
    pub sweep_interval_ms: u64,
    /// Simulated latency of the catalog fetch in milliseconds
    pub fetch_latency_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL_MS` - Background sweep interval (default: 0, disabled)
    /// - `FETCH_LATENCY_MS` - Simulated catalog latency (default: 50)
    ///
    /// Cache options are read by [`CacheConfig::from_env`].
    pub fn from_env() -> Self {
        Self {
            cache: CacheConfig::from_env(),
            server_port: env_or("SERVER_PORT", 3000),
            sweep_interval_ms: env_or("SWEEP_INTERVAL_MS", 0),
            fetch_latency_ms: env_or("FETCH_LATENCY_MS", 50),
        }
    }

    /// Returns the sweep interval, or None when the sweep task is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_ms > 0).then(|| Duration::from_millis(self.sweep_interval_ms))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            server_port: 3000,
            sweep_interval_ms: 0,
            fetch_latency_ms: 50,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
