//! Cache-aside layer for resolved queries.
//!
//! The cache is an optimization only: every miss, store error or undecodable
//! payload is answered by recomputing from the index. Two requests missing
//! the same key at once will both recompute and both write; the later write
//! wins. Recomputation is at-least-once, and an entry is never served past
//! the next purge after its TTL, so nothing stays stale forever.
//!
//! Hits bump a counter but do not refresh the write timestamp. The TTL
//! measures the age of the computed value, not how recently it was read.

mod store;

pub use store::{CacheEntry, CacheStore, MemoryCacheStore};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dataset::DatasetRow;
use crate::error::{AppError, Result};
use crate::filter::YearFilter;

/// Lowercased signature of a query: token, current flag, begin, end.
pub fn normalize_key(token: &str, filter: &YearFilter) -> String {
    fn bound(value: Option<i32>) -> String {
        value.map_or_else(|| "nil".to_string(), |v| v.to_string())
    }
    format!(
        "{}_{}_{}_{}",
        token.trim(),
        filter.current_only,
        bound(filter.begin),
        bound(filter.end)
    )
    .to_lowercase()
}

#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCacheStore::new()))
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<DatasetRow>>> {
        let Some(entry) = self.store.hit(key).await? else {
            return Ok(None);
        };
        let rows = serde_json::from_str(&entry.payload)
            .map_err(|e| AppError::CacheBackend(format!("undecodable payload for '{}': {}", key, e)))?;
        debug!(key, hits = entry.hits, "cache hit");
        Ok(Some(rows))
    }

    pub async fn put(&self, key: &str, rows: &[DatasetRow]) -> Result<()> {
        let payload = serde_json::to_string(rows)
            .map_err(|e| AppError::CacheBackend(e.to_string()))?;
        self.store.upsert(key, payload, Utc::now()).await
    }

    /// Drops entries whose last write is more than `older_than` ago.
    pub async fn purge(&self, older_than: chrono::Duration) -> Result<usize> {
        self.purge_before(Utc::now() - older_than).await
    }

    pub async fn purge_before(&self, threshold: DateTime<Utc>) -> Result<usize> {
        self.store.delete_written_before(threshold).await
    }

    pub async fn len(&self) -> Result<usize> {
        self.store.len().await
    }
}

/// Runs `purge(ttl)` every `every`, off the request path. The first sweep
/// happens one period after start.
pub fn spawn_purge_loop(cache: Cache, ttl: chrono::Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + every;
        let mut ticker = tokio::time::interval_at(start, every);
        loop {
            ticker.tick().await;
            match cache.purge(ttl).await {
                Ok(0) => debug!("cache purge: nothing expired"),
                Ok(removed) => info!(removed, "cache purge removed expired entries"),
                Err(e) => warn!("cache purge failed: {}", e),
            }
        }
    })
}
