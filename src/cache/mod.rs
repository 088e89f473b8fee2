//! Per-directory mapping cache.
//!
//! Each directory's [`Mapping`] lives behind its own `RwLock`: lookups take
//! the read lock, while bit updates and merges take the write lock, so no
//! reader ever sees a bitmap whose radix has not been recomputed yet.

pub mod storage;

use crate::config::GigaConfig;
use crate::error::Result;
use crate::metrics::{IndexMetrics, MetricsSnapshot};
use crate::partitioning::mapping::Mapping;
use crate::partitioning::resolver::PartitionRouter;
use crate::partitioning::split::{self, SplitTransaction};
use crate::types::{DirId, PartitionIndex, Placement, ServerId};
use std::sync::Arc;
use storage::MappingStore;
use tracing::{debug, info, warn};

/// Cached mappings for the directories this process touches.
#[derive(Debug)]
pub struct MappingCache {
    /// Mapping storage.
    store: MappingStore,

    /// Resolver bound to the configuration.
    router: PartitionRouter,

    /// Configuration used for new mappings.
    config: GigaConfig,
}

impl MappingCache {
    /// Create a cache for `config`.
    pub fn new(config: &GigaConfig) -> Result<Self> {
        config.validate()?;
        let metrics = Arc::new(IndexMetrics::new());
        info!(
            capacity = config.cache_capacity,
            policy = %config.split_policy,
            servers = config.server_count(),
            "creating mapping cache"
        );
        Ok(Self {
            store: MappingStore::new(config.cache_capacity, metrics.clone()),
            router: PartitionRouter::with_metrics(config, metrics),
            config: config.clone(),
        })
    }

    /// The router used for lookups.
    pub fn router(&self) -> &PartitionRouter {
        &self.router
    }

    /// Shared metrics.
    pub fn metrics(&self) -> &Arc<IndexMetrics> {
        self.router.metrics()
    }

    /// Point-in-time metrics.
    pub fn stats(&self) -> MetricsSnapshot {
        self.metrics().snapshot()
    }

    /// Get the mapping of `dir`, creating a fresh one homed on `zeroth_server`.
    pub fn get_or_insert(&self, dir: DirId, zeroth_server: ServerId) -> Result<Mapping> {
        let fresh = Mapping::init(
            self.config.split_policy,
            self.config.initial_partitions,
            zeroth_server,
            self.config.server_count(),
        )?;
        let (shared, inserted) = self.store.get_or_insert(dir, fresh);
        if inserted {
            debug!(dir, zeroth_server, "created directory mapping");
        }
        let mapping = shared.read().clone();
        Ok(mapping)
    }

    /// Insert or replace the mapping of `dir`.
    pub fn insert(&self, dir: DirId, mapping: Mapping) {
        debug!(dir, %mapping, "caching directory mapping");
        self.store.insert(dir, mapping);
    }

    /// Copy of the cached mapping of `dir`.
    pub fn get(&self, dir: DirId) -> Option<Mapping> {
        self.store.get(dir).map(|shared| shared.read().clone())
    }

    /// Merge a fresher copy received from another server.
    ///
    /// Caches a copy of `update` if `dir` was not cached. Returns the
    /// merged mapping.
    pub fn refresh(&self, dir: DirId, update: &Mapping) -> Mapping {
        let (shared, inserted) = self.store.get_or_insert(dir, update.clone());
        if inserted {
            return update.clone();
        }

        let mut mapping = shared.write();
        mapping.merge_update(update);
        self.metrics().merges.inc();
        debug!(dir, radix = mapping.radix(), "refreshed directory mapping");
        mapping.clone()
    }

    /// Placement of `name` in `dir`, or `None` if `dir` is not cached.
    ///
    /// A mapping that breaks an invariant is evicted so the caller refetches it.
    pub fn resolve(&self, dir: DirId, name: &[u8]) -> Result<Option<Placement>> {
        let shared = match self.store.get(dir) {
            Some(shared) => shared,
            None => return Ok(None),
        };

        let result = {
            let mapping = shared.read();
            self.router.placement_for_file(&mapping, name)
        };
        match result {
            Ok(placement) => Ok(Some(placement)),
            Err(e) => {
                if e.is_invariant_violation() {
                    warn!(dir, error = %e, "evicting inconsistent mapping");
                    self.store.invalidate(dir);
                }
                Err(e)
            }
        }
    }

    /// Start splitting partition `index` of `dir`.
    ///
    /// Returns `None` if `dir` is not cached or the policy refuses.
    pub fn begin_split(&self, dir: DirId, index: PartitionIndex) -> Result<Option<SplitTransaction>> {
        match self.store.get(dir) {
            Some(shared) => {
                let mapping = shared.read();
                self.router.begin_split(&mapping, index)
            }
            None => Ok(None),
        }
    }

    /// Commit `txn` into the mapping of `dir`.
    ///
    /// Returns `false` if `dir` is not cached.
    pub fn commit_split(&self, dir: DirId, txn: &mut SplitTransaction) -> Result<bool> {
        match self.store.get(dir) {
            Some(shared) => {
                self.router.commit_split(txn, &mut shared.write())?;
                info!(dir, parent = txn.parent(), child = txn.child(), "committed split");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Abort `txn` on `dir`. The cached mapping is not touched.
    pub fn abort_split(&self, dir: DirId, txn: &mut SplitTransaction) -> Result<()> {
        self.router.abort_split(txn)?;
        info!(dir, parent = txn.parent(), child = txn.child(), "aborted split");
        Ok(())
    }

    /// Record a split of `dir` completed elsewhere.
    ///
    /// Returns `false` if `dir` is not cached.
    pub fn apply_split(&self, dir: DirId, index: PartitionIndex) -> Result<bool> {
        match self.store.get(dir) {
            Some(shared) => {
                split::apply_split(&mut shared.write(), index)?;
                self.metrics().splits_applied.inc();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Roll back a split of `dir`.
    ///
    /// Returns `false` if `dir` is not cached.
    pub fn undo_split(&self, dir: DirId, index: PartitionIndex) -> Result<bool> {
        match self.store.get(dir) {
            Some(shared) => {
                split::undo_split(&mut shared.write(), index)?;
                self.metrics().splits_aborted.inc();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop the mapping of `dir`.
    pub fn evict(&self, dir: DirId) {
        debug!(dir, "evicting directory mapping");
        self.store.invalidate(dir);
    }

    /// Drop every mapping.
    pub fn clear(&self) {
        self.store.invalidate_all();
    }

    /// Number of cached directories.
    pub fn len(&self) -> u64 {
        self.store.entry_count()
    }

    /// Check if no directory is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies of every cached mapping.
    pub fn snapshot(&self) -> Vec<(DirId, Mapping)> {
        self.store.collect_entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerList;
    use crate::error::Error;
    use crate::partitioning::split::SplitPolicy;
    use crate::types::SplitState;

    fn cache() -> MappingCache {
        let config = GigaConfig::new(ServerList::new(["s0", "s1", "s2", "s3"]));
        MappingCache::new(&config).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = GigaConfig::default().with_max_buckets_per_server(0);
        assert!(matches!(MappingCache::new(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_get_or_insert() {
        let cache = cache();
        assert!(cache.get(1).is_none());

        let mapping = cache.get_or_insert(1, 2).unwrap();
        assert_eq!(mapping.zeroth_server(), 2);
        assert_eq!(mapping.server_count(), 4);
        assert_eq!(mapping.partition_count(), 1);

        // Existing entry wins over a different zeroth server.
        let again = cache.get_or_insert(1, 3).unwrap();
        assert_eq!(again, mapping);
        assert_eq!(cache.len(), 1);

        // One miss from `get`, one from the cold insert.
        let stats = cache.stats();
        assert_eq!(stats.cache_misses, 2);
        assert_eq!(stats.cache_hits, 1);
    }

    #[test]
    fn test_cold_lookups_count_one_miss() {
        let cache = cache();
        cache.get_or_insert(1, 0).unwrap();
        assert_eq!(cache.stats().cache_misses, 1);
        assert_eq!(cache.stats().cache_hits, 0);

        cache.refresh(2, &Mapping::new(0, 4));
        assert_eq!(cache.stats().cache_misses, 2);

        cache.get_or_insert(1, 0).unwrap();
        cache.refresh(2, &Mapping::new(0, 4));
        let stats = cache.stats();
        assert_eq!(stats.cache_misses, 2);
        assert_eq!(stats.cache_hits, 2);
    }

    #[test]
    fn test_abort_after_peer_update_keeps_partition() {
        let cache = cache();
        cache.get_or_insert(6, 0).unwrap();
        let mut txn = cache.begin_split(6, 0).unwrap().unwrap();

        let mut peer = Mapping::new(0, 4);
        peer.set_bit(txn.child()).unwrap();
        cache.refresh(6, &peer);

        cache.abort_split(6, &mut txn).unwrap();
        assert!(cache.get(6).unwrap().bit_status(txn.child()));
    }

    #[test]
    fn test_never_split_initial_mapping() {
        let config = GigaConfig::default().with_never_split(4);
        let cache = MappingCache::new(&config).unwrap();
        let mapping = cache.get_or_insert(5, 0).unwrap();
        assert_eq!(mapping.partitions().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(mapping.radix(), 2);
    }

    #[test]
    fn test_refresh_merges() {
        let cache = cache();
        cache.get_or_insert(1, 0).unwrap();
        cache.apply_split(1, 1).unwrap();

        let mut update = Mapping::new(0, 4);
        update.set_bit(2).unwrap();
        let merged = cache.refresh(1, &update);
        assert_eq!(merged.partitions().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(merged.radix(), 2);
        assert_eq!(cache.get(1), Some(merged));
        assert_eq!(cache.stats().merges, 1);

        // Unknown directory takes the update as is.
        let taken = cache.refresh(2, &update);
        assert_eq!(taken, update);
        assert_eq!(cache.stats().merges, 1);
    }

    #[test]
    fn test_resolve() {
        let cache = cache();
        assert_eq!(cache.resolve(1, b"a.txt").unwrap(), None);

        cache.get_or_insert(1, 1).unwrap();
        let placement = cache.resolve(1, b"a.txt").unwrap().unwrap();
        assert_eq!(placement.index, 0);
        assert_eq!(placement.server, 1);
        assert_eq!(placement.bucket, 0);
        assert_eq!(cache.stats().lookups, 1);
    }

    #[test]
    fn test_local_split_through_cache() {
        let cache = cache();
        cache.get_or_insert(3, 0).unwrap();

        let mut txn = cache.begin_split(3, 0).unwrap().unwrap();
        assert_eq!(txn.child(), 1);
        assert!(!cache.get(3).unwrap().bit_status(1));

        assert!(cache.commit_split(3, &mut txn).unwrap());
        assert_eq!(txn.state(), SplitState::Present);
        assert!(cache.get(3).unwrap().bit_status(1));

        let mut txn = cache.begin_split(3, 0).unwrap().unwrap();
        assert_eq!(txn.child(), 2);
        cache.abort_split(3, &mut txn).unwrap();
        assert!(!cache.get(3).unwrap().bit_status(2));

        let stats = cache.stats();
        assert_eq!(stats.splits_applied, 1);
        assert_eq!(stats.splits_aborted, 1);
    }

    #[test]
    fn test_split_of_uncached_directory() {
        let cache = cache();
        assert!(cache.begin_split(9, 0).unwrap().is_none());
        assert!(!cache.apply_split(9, 1).unwrap());
        assert!(!cache.undo_split(9, 1).unwrap());
    }

    #[test]
    fn test_never_split_refuses() {
        let config = GigaConfig::default().with_never_split(2);
        let cache = MappingCache::new(&config).unwrap();
        cache.get_or_insert(1, 0).unwrap();
        assert!(cache.begin_split(1, 0).unwrap().is_none());
        assert_eq!(cache.router().policy(), SplitPolicy::NeverSplit);
    }

    #[test]
    fn test_apply_and_undo() {
        let cache = cache();
        cache.insert(4, Mapping::new(0, 4));
        assert!(cache.apply_split(4, 1).unwrap());
        assert!(cache.apply_split(4, 3).unwrap());
        assert_eq!(cache.get(4).unwrap().radix(), 2);

        assert!(cache.undo_split(4, 3).unwrap());
        assert_eq!(cache.get(4).unwrap().radix(), 1);

        assert!(cache.undo_split(4, 0).is_err());
        assert!(cache.get(4).unwrap().bit_status(0));
    }

    #[test]
    fn test_evict_and_clear() {
        let cache = cache();
        cache.get_or_insert(1, 0).unwrap();
        cache.get_or_insert(2, 0).unwrap();
        assert_eq!(cache.snapshot().len(), 2);

        cache.evict(1);
        assert!(cache.get(1).is_none());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
