//! API Module
//!
//! HTTP handlers and routing for the cache diagnostics API.
//!
//! # Endpoints
//! - `GET /records/:id` - Read a record through the cache
//! - `GET /records/:id/peek` - Read a cached record without fetching
//! - `POST /records/:id/refresh` - Drop and re-fetch a record
//! - `DELETE /cache/:key`, `DELETE /cache` - Clear entries
//! - `POST /cache/sweep` - Remove entries older than a given age
//! - `GET /stats` - Cache statistics snapshot
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
