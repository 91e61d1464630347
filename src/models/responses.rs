//! Response DTOs for the diagnostics API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::catalog::CatalogRecord;

/// Response body for record reads (GET /records/:id, GET /records/:id/peek)
#[derive(Debug, Clone, Serialize)]
pub struct RecordResponse {
    /// The requested id
    pub id: String,
    /// The cached record
    pub record: CatalogRecord,
}

impl RecordResponse {
    pub fn new(id: impl Into<String>, record: CatalogRecord) -> Self {
        Self {
            id: id.into(),
            record,
        }
    }
}

/// Response body for clear and sweep operations
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    /// Human-readable summary
    pub message: String,
    /// Number of entries removed
    pub evicted: usize,
}

impl ClearResponse {
    /// Creates a response for clearing a single key
    pub fn key(key: &str, evicted: usize) -> Self {
        Self {
            message: format!("Cleared key '{}'", key),
            evicted,
        }
    }

    /// Creates a response for clearing every entry
    pub fn all(evicted: usize) -> Self {
        Self {
            message: "Cleared all entries".to_string(),
            evicted,
        }
    }

    /// Creates a response for an age-based sweep
    pub fn sweep(max_age_ms: u64, evicted: usize) -> Self {
        Self {
            message: format!("Swept entries older than {}ms", max_age_ms),
            evicted,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_response_serialize() {
        let resp = RecordResponse::new("skill-rust", CatalogRecord::new("skill-rust", "Rust", "skill"));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["id"], "skill-rust");
        assert_eq!(json["record"]["name"], "Rust");
    }

    #[test]
    fn test_clear_responses() {
        let resp = ClearResponse::key("k", 1);
        assert!(resp.message.contains("'k'"));
        assert_eq!(resp.evicted, 1);

        assert_eq!(ClearResponse::all(4).evicted, 4);
        assert!(ClearResponse::sweep(250, 0).message.contains("250ms"));
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
