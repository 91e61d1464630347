//! Catalog Module
//!
//! Static lookup table of portfolio records, served with a simulated latency.
//! This is the data source the server puts behind its request cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One record served by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: String,
    pub name: String,
    pub category: String,
}

impl CatalogRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
        }
    }
}

// == Catalog ==
/// Read-only record source.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Arc<HashMap<String, CatalogRecord>>,
    latency: Duration,
    fetches: Arc<AtomicU64>,
}

impl Catalog {
    pub fn new(records: impl IntoIterator<Item = CatalogRecord>, latency: Duration) -> Self {
        Self {
            records: Arc::new(records.into_iter().map(|r| (r.id.clone(), r)).collect()),
            latency,
            fetches: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The catalog the server starts with: a handful of skills and countries.
    pub fn seeded(latency: Duration) -> Self {
        Self::new(
            [
                CatalogRecord::new("skill-rust", "Rust", "skill"),
                CatalogRecord::new("skill-typescript", "TypeScript", "skill"),
                CatalogRecord::new("skill-sql", "SQL", "skill"),
                CatalogRecord::new("country-fr", "France", "country"),
                CatalogRecord::new("country-be", "Belgium", "country"),
                CatalogRecord::new("country-jp", "Japan", "country"),
            ],
            latency,
        )
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of fetches served so far, failed ones included.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    // == Fetch ==
    /// Looks up a record after the configured latency.
    ///
    /// Fails for unknown ids.
    pub async fn fetch(&self, id: String, correlation_id: String) -> anyhow::Result<CatalogRecord> {
        debug!(%correlation_id, "Fetching catalog record '{}'", id);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);

        self.records
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow!("record '{}' does not exist", id))
    }
}
