//! Moka cache wrapper holding per-directory mappings.

use crate::metrics::IndexMetrics;
use crate::partitioning::mapping::Mapping;
use crate::types::DirId;
use moka::sync::Cache;
use parking_lot::RwLock;
use std::sync::Arc;

/// A cached mapping, shared between readers and the single writer.
pub type SharedMapping = Arc<RwLock<Mapping>>;

/// Local mapping storage backed by Moka.
pub struct MappingStore {
    /// The underlying Moka cache.
    cache: Cache<DirId, SharedMapping>,

    /// Hit and miss counters.
    metrics: Arc<IndexMetrics>,
}

impl MappingStore {
    /// Create a store bounded to `capacity` directories.
    pub fn new(capacity: u64, metrics: Arc<IndexMetrics>) -> Self {
        Self {
            cache: Cache::builder().max_capacity(capacity).build(),
            metrics,
        }
    }

    /// Get the mapping of `dir`, counting a hit or miss.
    pub fn get(&self, dir: DirId) -> Option<SharedMapping> {
        let result = self.cache.get(&dir);
        if result.is_some() {
            self.metrics.cache_hits.inc();
        } else {
            self.metrics.cache_misses.inc();
        }
        result
    }

    /// Get the mapping of `dir`, inserting `mapping` if there is none.
    ///
    /// Returns the cached entry and whether it was inserted by this call.
    pub fn get_or_insert(&self, dir: DirId, mapping: Mapping) -> (SharedMapping, bool) {
        let entry = self
            .cache
            .entry(dir)
            .or_insert(Arc::new(RwLock::new(mapping)));
        let inserted = entry.is_fresh();
        if inserted {
            self.metrics.cache_misses.inc();
        } else {
            self.metrics.cache_hits.inc();
        }
        (entry.into_value(), inserted)
    }

    /// Check if `dir` is cached, without touching statistics.
    pub fn contains(&self, dir: DirId) -> bool {
        self.cache.contains_key(&dir)
    }

    /// Insert or replace the mapping of `dir`.
    pub fn insert(&self, dir: DirId, mapping: Mapping) {
        self.cache.insert(dir, Arc::new(RwLock::new(mapping)));
    }

    /// Remove the mapping of `dir`.
    pub fn invalidate(&self, dir: DirId) {
        self.cache.invalidate(&dir);
    }

    /// Remove every mapping.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Number of cached directories.
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    /// Copies of all cached mappings, in arbitrary order.
    pub fn collect_entries(&self) -> Vec<(DirId, Mapping)> {
        self.cache
            .iter()
            .map(|(dir, mapping)| (*dir, mapping.read().clone()))
            .collect()
    }
}

impl std::fmt::Debug for MappingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingStore")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}
