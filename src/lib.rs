//! Request Cache - A concurrent memoizing cache for fetch results
//!
//! Coalesces concurrent fetches for the same key, bounds memory with TTL
//! expiry and age-based eviction, and reports what it holds.

pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{RequestCache, Suspense, WaitHandle};
pub use config::{CacheConfig, Config};
pub use error::{CacheError, Result};
pub use tasks::spawn_sweep_task;
