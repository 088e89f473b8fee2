//! Split planning.
//!
//! Decides whether a partition may split under a [`SplitPolicy`], picks the
//! child address the split would create, and applies or rolls back the
//! post-split bitmap update. Moving the entries themselves is the caller's
//! job: `apply_split` must only run after the data move has completed.

use crate::error::{Error, InvariantError, Result};
use crate::partitioning::bitmap::{child_index, parent_index, radix_from_index, MAX_RADIX};
use crate::partitioning::mapping::Mapping;
use crate::partitioning::migration::MigrationPlan;
use crate::types::{PartitionIndex, SplitState};
use serde::{Deserialize, Serialize};

/// Default number of partitions a server hosts under
/// [`SplitPolicy::BoundedByServerCount`].
pub const DEFAULT_MAX_BUCKETS_PER_SERVER: u32 = 1;

/// Rule deciding whether a partition may split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplitPolicy {
    /// Always splittable.
    #[default]
    Unbounded,
    /// Never splittable; the partition set is fixed at creation.
    NeverSplit,
    /// Splittable while the new address stays below
    /// `max_buckets_per_server * server_count`.
    BoundedByServerCount,
    /// Declared without semantics; every query fails with `Unimplemented`.
    NextPowerOfTwo,
}

impl std::fmt::Display for SplitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitPolicy::Unbounded => write!(f, "unbounded"),
            SplitPolicy::NeverSplit => write!(f, "never_split"),
            SplitPolicy::BoundedByServerCount => write!(f, "bounded_by_server_count"),
            SplitPolicy::NextPowerOfTwo => write!(f, "next_power_of_two"),
        }
    }
}

impl std::str::FromStr for SplitPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unbounded" => Ok(SplitPolicy::Unbounded),
            "never_split" => Ok(SplitPolicy::NeverSplit),
            "bounded_by_server_count" => Ok(SplitPolicy::BoundedByServerCount),
            "next_power_of_two" => Ok(SplitPolicy::NextPowerOfTwo),
            other => Err(Error::Config(format!("unknown split policy: {}", other))),
        }
    }
}

/// Whether partition `index` may split under `policy`.
pub fn is_splittable(
    mapping: &Mapping,
    index: PartitionIndex,
    policy: SplitPolicy,
    max_buckets_per_server: u32,
) -> Result<bool> {
    match policy {
        SplitPolicy::Unbounded => Ok(true),
        SplitPolicy::NeverSplit => Ok(false),
        SplitPolicy::BoundedByServerCount => {
            let new_index = index_for_splitting(mapping, index)?;
            let ceiling = u64::from(max_buckets_per_server) * u64::from(mapping.server_count());
            Ok(u64::from(new_index) < ceiling)
        }
        SplitPolicy::NextPowerOfTwo => Err(Error::Unimplemented("split policy next_power_of_two")),
    }
}

/// Address of the partition created by splitting `index`.
///
/// Scans `child(index, r)` for increasing `r`, starting at the radix of
/// `index`, and returns the first child not yet present. `index` itself
/// must be present.
pub fn index_for_splitting(mapping: &Mapping, index: PartitionIndex) -> Result<PartitionIndex> {
    if !mapping.bit_status(index) {
        return Err(InvariantError::PartitionAbsent(index).into());
    }

    let exhausted = InvariantError::AddressSpaceExhausted {
        index,
        max_radix: MAX_RADIX,
    };
    let new_index = (radix_from_index(index)..MAX_RADIX)
        .filter_map(|radix| child_index(index, radix))
        .find(|&child| !mapping.bit_status(child))
        .ok_or(exhausted)?;

    tracing::debug!(index, new_index, "selected split target");
    Ok(new_index)
}

/// Partition that must split to materialize `index`.
///
/// Used to place the first partition of a newly added server.
pub fn index_for_force_splitting(index: PartitionIndex) -> PartitionIndex {
    parent_index(index)
}

/// Deterministic replica address for `index`, independent of occupancy.
pub fn index_for_backup(index: PartitionIndex) -> Result<PartitionIndex> {
    child_index(index, radix_from_index(index)).ok_or_else(|| {
        InvariantError::AddressSpaceExhausted {
            index,
            max_radix: PartitionIndex::BITS,
        }
        .into()
    })
}

/// Record a completed split.
///
/// The bit update is idempotent; the data move it stands for is not, so
/// callers must apply each split address at most once.
pub fn apply_split(mapping: &mut Mapping, new_index: PartitionIndex) -> Result<()> {
    mapping.set_bit(new_index)?;
    tracing::info!(new_index, radix = mapping.radix(), "applied split");
    Ok(())
}

/// Roll back the bitmap update of an aborted split.
pub fn undo_split(mapping: &mut Mapping, new_index: PartitionIndex) -> Result<()> {
    mapping.clear_bit(new_index)?;
    tracing::info!(new_index, radix = mapping.radix(), "rolled back split");
    Ok(())
}

/// Local bookkeeping for one split of `parent` into `child`.
///
/// Tracks the `Absent -> Splitting -> Present` lifecycle of the child
/// address. The cross-server handshake around it is driven by the caller.
#[derive(Debug, Clone)]
pub struct SplitTransaction {
    parent: PartitionIndex,
    child: PartitionIndex,
    state: SplitState,
}

impl SplitTransaction {
    /// Start splitting `parent`.
    ///
    /// Returns `None` if the policy does not allow the split.
    pub fn begin(
        mapping: &Mapping,
        parent: PartitionIndex,
        policy: SplitPolicy,
        max_buckets_per_server: u32,
    ) -> Result<Option<Self>> {
        if !mapping.bit_status(parent) {
            return Err(InvariantError::PartitionAbsent(parent).into());
        }
        if !is_splittable(mapping, parent, policy, max_buckets_per_server)? {
            tracing::debug!(parent, %policy, "split refused by policy");
            return Ok(None);
        }

        let child = index_for_splitting(mapping, parent)?;
        let mut txn = Self {
            parent,
            child,
            state: SplitState::Absent,
        };
        txn.transition(SplitState::Splitting)?;
        tracing::info!(parent, child, "split started");
        Ok(Some(txn))
    }

    /// Partition being split.
    pub fn parent(&self) -> PartitionIndex {
        self.parent
    }

    /// Partition being created.
    pub fn child(&self) -> PartitionIndex {
        self.child
    }

    /// Current state of the child address.
    pub fn state(&self) -> SplitState {
        self.state
    }

    /// Sort `names` of the parent partition into those that stay and those
    /// that move to the child.
    pub fn plan_migration<I, N>(&self, names: I) -> Result<MigrationPlan>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<[u8]>,
    {
        MigrationPlan::build(names, self.child)
    }

    /// Make the child visible once its entries have been moved.
    pub fn commit(&mut self, mapping: &mut Mapping) -> Result<()> {
        self.check(SplitState::Present)?;
        apply_split(mapping, self.child)?;
        self.state = SplitState::Present;
        Ok(())
    }

    /// Abandon the split.
    ///
    /// The mapping is left alone: the child bit may already have been merged
    /// in from a server that completed the same split, and a known partition
    /// is never forgotten. A bit set early by the caller is rolled back with
    /// [`undo_split`].
    pub fn abort(&mut self) -> Result<()> {
        self.check(SplitState::Absent)?;
        self.state = SplitState::Absent;
        tracing::info!(parent = self.parent, child = self.child, "split aborted");
        Ok(())
    }

    fn check(&self, next: SplitState) -> Result<()> {
        if self.state.can_transition_to(next) {
            Ok(())
        } else {
            Err(InvariantError::IllegalTransition {
                index: self.child,
                from: self.state,
                to: next,
            }
            .into())
        }
    }

    fn transition(&mut self, next: SplitState) -> Result<()> {
        self.check(next)?;
        self.state = next;
        Ok(())
    }
}
