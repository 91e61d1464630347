//! API Routes
//!
//! Configures the Axum router with all diagnostics endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_all_handler, clear_key_handler, get_record_handler, health_handler, peek_record_handler,
    refresh_record_handler, stats_handler, sweep_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /records/:id` - Read a record through the cache
/// - `GET /records/:id/peek` - Read a cached record without fetching
/// - `POST /records/:id/refresh` - Drop and re-fetch a record
/// - `DELETE /cache/:key` - Clear one key
/// - `DELETE /cache` - Clear every entry
/// - `POST /cache/sweep` - Remove entries older than `max_age_ms`
/// - `GET /stats` - Cache statistics snapshot
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/records/:id", get(get_record_handler))
        .route("/records/:id/peek", get(peek_record_handler))
        .route("/records/:id/refresh", post(refresh_record_handler))
        .route("/cache", delete(clear_all_handler))
        .route("/cache/sweep", post(sweep_handler))
        .route("/cache/:key", delete(clear_key_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
