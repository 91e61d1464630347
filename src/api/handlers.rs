//! API Handlers
//!
//! HTTP request handlers for each diagnostics endpoint.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::{CacheStatistics, RequestCache};
use crate::catalog::{Catalog, CatalogRecord};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{validate_record_id, ClearResponse, HealthResponse, RecordResponse, SweepRequest};

/// Cache of catalog records, keyed by record id.
pub type RecordCache = RequestCache<String, CatalogRecord>;

/// Application state shared across all handlers.
///
/// Both fields are cheap handles; clones share the same cache and catalog.
#[derive(Clone, Debug)]
pub struct AppState {
    pub cache: RecordCache,
    pub catalog: Catalog,
}

impl AppState {
    /// Creates a new AppState from an existing cache and catalog.
    pub fn new(cache: RecordCache, catalog: Catalog) -> Self {
        Self { cache, catalog }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_config(config: &Config) -> Self {
        let cache = RequestCache::builder(config.cache.clone())
            .operation("records")
            .json_sizer()
            .build();
        let catalog = Catalog::seeded(Duration::from_millis(config.fetch_latency_ms));
        Self::new(cache, catalog)
    }
}

fn check_id(id: &str) -> Result<()> {
    match validate_record_id(id) {
        Some(message) => Err(CacheError::InvalidRequest(message)),
        None => Ok(()),
    }
}

/// Handler for GET /records/:id
///
/// Reads a record through the cache, fetching it from the catalog on a miss.
pub async fn get_record_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RecordResponse>> {
    check_id(&id)?;

    let catalog = state.catalog.clone();
    let record = state
        .cache
        .get_or_fetch(id.clone(), move |id, correlation_id| async move {
            catalog.fetch(id, correlation_id).await
        })
        .await?;

    Ok(Json(RecordResponse::new(id, record)))
}

/// Handler for GET /records/:id/peek
///
/// Returns the cached record without fetching.
pub async fn peek_record_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RecordResponse>> {
    check_id(&id)?;

    match state.cache.peek(&id) {
        Some(record) => Ok(Json(RecordResponse::new(id, record))),
        None => Err(CacheError::NotFound(id)),
    }
}

/// Handler for POST /records/:id/refresh
///
/// Drops the cached record and fetches it again.
pub async fn refresh_record_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RecordResponse>> {
    check_id(&id)?;

    let catalog = state.catalog.clone();
    let record = state
        .cache
        .refresh(id.clone(), move |id, correlation_id| async move {
            catalog.fetch(id, correlation_id).await
        })
        .await?;

    Ok(Json(RecordResponse::new(id, record)))
}

/// Handler for DELETE /cache/:key
pub async fn clear_key_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<ClearResponse> {
    let evicted = state.cache.clear(Some(&key));
    Json(ClearResponse::key(&key, evicted))
}

/// Handler for DELETE /cache
pub async fn clear_all_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    Json(ClearResponse::all(state.cache.clear(None)))
}

/// Handler for POST /cache/sweep
///
/// Removes every entry older than the requested age.
pub async fn sweep_handler(
    State(state): State<AppState>,
    Json(req): Json<SweepRequest>,
) -> Json<ClearResponse> {
    let evicted = state
        .cache
        .clear_expired(Duration::from_millis(req.max_age_ms));
    Json(ClearResponse::sweep(req.max_age_ms, evicted))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<CacheStatistics> {
    Json(state.cache.stats())
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
