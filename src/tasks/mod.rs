//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry sweep: Removes entries older than the cache TTL at a configured interval

mod sweep;

pub use sweep::spawn_sweep_task;
