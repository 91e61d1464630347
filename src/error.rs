//! Error types for the request cache
//!
//! Provides unified error handling using thiserror.

use std::error::Error as StdError;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Shared, cloneable form of a fetch function's error.
///
/// Every caller waiting on the same flight receives a clone pointing at the
/// same underlying error.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

// == Cache Error Enum ==
/// Unified error type for the request cache.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// The fetch function failed; delivered verbatim to every waiter
    #[error("Fetch failed for key '{key}' [{correlation_id}]: {source}")]
    Fetch {
        key: String,
        correlation_id: String,
        #[source]
        source: SharedError,
    },

    /// The flight ended without producing an outcome
    #[error("Fetch abandoned for key '{key}' [{correlation_id}]")]
    Abandoned { key: String, correlation_id: String },

    /// Eviction failed to keep the map within capacity
    #[error("Capacity invariant violated: {len} entries with max_size {max_size}")]
    CapacityInvariant { len: usize, max_size: usize },

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CacheError {
    /// Wraps a fetch function error for broadcast to all waiters.
    pub fn fetch(
        key: impl Into<String>,
        correlation_id: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        CacheError::Fetch {
            key: key.into(),
            correlation_id: correlation_id.into(),
            source: Arc::from(source.into()),
        }
    }

    /// Returns the correlation id of the flight this error belongs to, if any.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            CacheError::Fetch { correlation_id, .. } | CacheError::Abandoned { correlation_id, .. } => {
                Some(correlation_id)
            }
            _ => None,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Fetch { .. } | CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Abandoned { .. } => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::CapacityInvariant { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "correlation_id": self.correlation_id(),
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the request cache.
pub type Result<T> = std::result::Result<T, CacheError>;
