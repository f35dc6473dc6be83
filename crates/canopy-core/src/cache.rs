//! In-memory cache of finished estimates.
//!
//! The key covers the evaluation ids and every configuration field, so two
//! calls differing in filter, grouping, land type, mode or uncertainty
//! output never share an entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::config::EstimationConfig;
use crate::error::{EstimationError, Result};
use crate::output::EstimateTable;
use crate::scope::EstimationScope;
use crate::tables::EvalId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(evalids: &[EvalId], config: &EstimationConfig) -> Result<Self> {
        serde_json::to_string(&(evalids, config))
            .map(CacheKey)
            .map_err(|e| EstimationError::Configuration(format!("cannot build cache key: {e}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Estimate cache shared across callers.
#[derive(Debug, Default)]
pub struct EstimateCache {
    entries: RwLock<HashMap<CacheKey, Arc<EstimateTable>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EstimateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<EstimateTable>> {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        entries.get(key).cloned()
    }

    /// Cached result for `(scope, config)`, computing and storing it on a
    /// miss. Errors are not cached.
    pub fn get_or_compute<F>(
        &self,
        scope: &EstimationScope,
        config: &EstimationConfig,
        compute: F,
    ) -> Result<Arc<EstimateTable>>
    where
        F: FnOnce() -> Result<EstimateTable>,
    {
        let key = CacheKey::new(scope.evalids(), config)?;
        if let Some(hit) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(measure = ?config.measure, "estimate cache hit");
            return Ok(hit);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let table = Arc::new(compute()?);
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.insert(key, Arc::clone(&table));
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.clear();
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }
}
