use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub payload: String,
    pub last_written: DateTime<Utc>,
    pub hits: u64,
}

/// Key-value document store behind the query cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Point lookup by key. A found entry has its hit counter bumped in the
    /// same step; the returned entry carries the new count.
    async fn hit(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Overwrites payload and timestamp of an existing entry, leaving hits
    /// alone, or inserts a new one with `hits = 1`.
    async fn upsert(&self, key: &str, payload: String, written_at: DateTime<Utc>) -> Result<()>;

    /// Removes every entry written before `threshold`, returning how many went.
    async fn delete_written_before(&self, threshold: DateTime<Utc>) -> Result<usize>;

    async fn len(&self) -> Result<usize>;
}

#[derive(Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn hit(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get_mut(key).map(|mut entry| {
            entry.hits += 1;
            entry.clone()
        }))
    }

    async fn upsert(&self, key: &str, payload: String, written_at: DateTime<Utc>) -> Result<()> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.payload = payload;
                entry.last_written = written_at;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry {
                    key: key.to_string(),
                    payload,
                    last_written: written_at,
                    hits: 1,
                });
            }
        }
        Ok(())
    }

    async fn delete_written_before(&self, threshold: DateTime<Utc>) -> Result<usize> {
        // retain locks one shard at a time
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = entry.last_written >= threshold;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.len())
    }
}
