//! Name to partition and partition to server resolution.
//!
//! A name's candidate address is the low `radix` bits of its hash. If that
//! partition does not exist yet, the lookup falls back to its parent, and so
//! on, until it reaches a present partition. The root is always present, so
//! the walk ends.

use crate::config::GigaConfig;
use crate::error::{InvariantError, Result};
use crate::metrics::IndexMetrics;
use crate::partitioning::bitmap::parent_index;
use crate::partitioning::hash::{HashValue, NameHasher};
use crate::partitioning::mapping::Mapping;
use crate::partitioning::migration::{hash_moves_to, MigrationPlan};
use crate::partitioning::split::{self, SplitPolicy, SplitTransaction};
use crate::types::{PartitionIndex, Placement, ServerId};
use std::sync::Arc;

/// Walk from the hash candidate to the nearest present partition.
///
/// Returns the partition and the number of parent steps taken.
fn resolve_hash(mapping: &Mapping, hash: &HashValue) -> Result<(PartitionIndex, u32)> {
    if !mapping.bit_status(0) {
        return Err(InvariantError::MissingRoot.into());
    }

    let mut index = hash.low_bits(mapping.radix());
    let mut hops = 0;
    while !mapping.bit_status(index) {
        index = parent_index(index);
        hops += 1;
    }
    Ok((index, hops))
}

/// Partition holding a name with `hash`.
pub fn index_for_hash(mapping: &Mapping, hash: &HashValue) -> Result<PartitionIndex> {
    resolve_hash(mapping, hash).map(|(index, _)| index)
}

/// Partition holding `name`, hashed with the default name bound.
pub fn index_for_file(mapping: &Mapping, name: &[u8]) -> Result<PartitionIndex> {
    index_for_file_with(&NameHasher::default(), mapping, name)
}

fn index_for_file_with(
    hasher: &NameHasher,
    mapping: &Mapping,
    name: &[u8],
) -> Result<PartitionIndex> {
    let index = index_for_hash(mapping, &hasher.hash(name)?)?;
    tracing::trace!(index, radix = mapping.radix(), "resolved name");
    Ok(index)
}

/// Server hosting partition `index`.
#[inline]
pub fn server_for_index(mapping: &Mapping, index: PartitionIndex) -> ServerId {
    let server = (u64::from(index) + u64::from(mapping.zeroth_server()))
        % u64::from(mapping.server_count().max(1));
    // The modulus is a u32, so the result fits.
    server as ServerId
}

/// Position of partition `index` in its server's local partition list.
#[inline]
pub fn bucket_num_for_server(mapping: &Mapping, index: PartitionIndex) -> u32 {
    index % mapping.server_count().max(1)
}

/// Server hosting `name`.
pub fn server_for_file(mapping: &Mapping, name: &[u8]) -> Result<ServerId> {
    Ok(server_for_index(mapping, index_for_file(mapping, name)?))
}

/// Full placement of partition `index`.
pub fn placement_for_index(mapping: &Mapping, index: PartitionIndex) -> Placement {
    Placement {
        index,
        server: server_for_index(mapping, index),
        bucket: bucket_num_for_server(mapping, index),
    }
}

/// Full placement of `name`.
pub fn placement_for_file(mapping: &Mapping, name: &[u8]) -> Result<Placement> {
    Ok(placement_for_index(mapping, index_for_file(mapping, name)?))
}

/// Resolver and split planner bound to one configuration.
///
/// Applies the configured name bound, split policy and bucket bound, and
/// records every lookup and failure in [`IndexMetrics`].
#[derive(Debug, Clone)]
pub struct PartitionRouter {
    hasher: NameHasher,
    policy: SplitPolicy,
    max_buckets_per_server: u32,
    metrics: Arc<IndexMetrics>,
}

impl PartitionRouter {
    /// Create a router with its own metrics.
    pub fn new(config: &GigaConfig) -> Self {
        Self::with_metrics(config, Arc::new(IndexMetrics::new()))
    }

    /// Create a router that records into shared `metrics`.
    pub fn with_metrics(config: &GigaConfig, metrics: Arc<IndexMetrics>) -> Self {
        Self {
            hasher: NameHasher::new(config.max_name_len),
            policy: config.split_policy,
            max_buckets_per_server: config.max_buckets_per_server,
            metrics,
        }
    }

    /// Configured split policy.
    pub fn policy(&self) -> SplitPolicy {
        self.policy
    }

    /// Metrics this router records into.
    pub fn metrics(&self) -> &Arc<IndexMetrics> {
        &self.metrics
    }

    fn observe<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.metrics.record_error(e);
        }
        result
    }

    /// Hash `name` under the configured bound.
    pub fn hash(&self, name: &[u8]) -> Result<HashValue> {
        self.observe(self.hasher.hash(name))
    }

    /// Partition holding `name`.
    pub fn index_for_file(&self, mapping: &Mapping, name: &[u8]) -> Result<PartitionIndex> {
        let resolved = self
            .hasher
            .hash(name)
            .and_then(|hash| resolve_hash(mapping, &hash));
        let (index, hops) = self.observe(resolved)?;
        self.metrics.record_lookup(hops);
        tracing::trace!(index, hops, radix = mapping.radix(), "resolved name");
        Ok(index)
    }

    /// Server hosting `name`.
    pub fn server_for_file(&self, mapping: &Mapping, name: &[u8]) -> Result<ServerId> {
        Ok(server_for_index(mapping, self.index_for_file(mapping, name)?))
    }

    /// Full placement of `name`.
    pub fn placement_for_file(&self, mapping: &Mapping, name: &[u8]) -> Result<Placement> {
        Ok(placement_for_index(mapping, self.index_for_file(mapping, name)?))
    }

    /// Whether partition `index` may split under the configured policy.
    pub fn is_splittable(&self, mapping: &Mapping, index: PartitionIndex) -> Result<bool> {
        self.observe(split::is_splittable(
            mapping,
            index,
            self.policy,
            self.max_buckets_per_server,
        ))
    }

    /// Address of the partition created by splitting `index`.
    pub fn index_for_splitting(
        &self,
        mapping: &Mapping,
        index: PartitionIndex,
    ) -> Result<PartitionIndex> {
        self.observe(split::index_for_splitting(mapping, index))
    }

    /// Start splitting `index`, or `None` if the policy refuses.
    pub fn begin_split(
        &self,
        mapping: &Mapping,
        index: PartitionIndex,
    ) -> Result<Option<SplitTransaction>> {
        self.observe(SplitTransaction::begin(
            mapping,
            index,
            self.policy,
            self.max_buckets_per_server,
        ))
    }

    /// Commit `txn` into `mapping`.
    pub fn commit_split(&self, txn: &mut SplitTransaction, mapping: &mut Mapping) -> Result<()> {
        self.observe(txn.commit(mapping))?;
        self.metrics.splits_applied.inc();
        Ok(())
    }

    /// Abort `txn`. The mapping is not touched.
    pub fn abort_split(&self, txn: &mut SplitTransaction) -> Result<()> {
        self.observe(txn.abort())?;
        self.metrics.splits_aborted.inc();
        Ok(())
    }

    /// Whether `name` must move into the newly created `new_index`.
    pub fn file_migration_status(&self, name: &[u8], new_index: PartitionIndex) -> Result<bool> {
        let hash = self.hash(name)?;
        self.metrics.migration_checks.inc();
        Ok(hash_moves_to(&hash, new_index))
    }

    /// Sort `names` of a splitting partition for a split creating `target`.
    pub fn plan_migration<I, N>(&self, names: I, target: PartitionIndex) -> Result<MigrationPlan>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<[u8]>,
    {
        let plan = self.observe(MigrationPlan::build_with(&self.hasher, names, target))?;
        self.metrics.migration_checks.inc_by(plan.total() as u64);
        Ok(plan)
    }
}
