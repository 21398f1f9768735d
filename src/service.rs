use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{normalize_key, Cache};
use crate::dataset::DatasetRow;
use crate::error::Result;
use crate::filter::{apply_range, YearFilter};
use crate::index::LetterIndex;

/// A lookup as the HTTP layer hands it over. An empty token means every
/// country.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub token: String,
    pub filter: YearFilter,
}

impl Query {
    pub fn new(token: &str, filter: YearFilter) -> Self {
        Self { token: token.trim().to_string(), filter }
    }
}

/// Index, filter and cache behind one `resolve` call.
#[derive(Clone)]
pub struct RenewablesService {
    index: Arc<LetterIndex>,
    cache: Cache,
    current_year: i32,
}

impl RenewablesService {
    pub fn new(index: Arc<LetterIndex>, cache: Cache, current_year: i32) -> Self {
        Self { index, cache, current_year }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Matching rows in dataset order. An empty vector means "no match";
    /// `IndexUnavailable` means nothing was loaded.
    pub async fn resolve(&self, query: &Query) -> Result<Vec<DatasetRow>> {
        if query.token.is_empty() {
            return Ok(apply_range(self.index.all()?, query.filter, self.current_year));
        }

        let key = normalize_key(&query.token, &query.filter);
        match self.cache.get(&key).await {
            Ok(Some(rows)) => return Ok(rows),
            Ok(None) => debug!(key = %key, "cache miss"),
            Err(e) => warn!(key = %key, "cache read failed, computing directly: {}", e),
        }

        let candidates = self.index.find(&query.token)?;
        let rows = apply_range(&candidates, query.filter, self.current_year);

        if let Err(e) = self.cache.put(&key, &rows).await {
            warn!(key = %key, "cache write failed: {}", e);
        }
        Ok(rows)
    }
}
