//! Post-split migration decisions.
//!
//! While a partition splits, every entry it holds is checked against the
//! new child address. The check looks only at the name's hash and the child
//! address, never at the bitmap, so it stays cheap per entry.

use crate::error::Result;
use crate::partitioning::bitmap::radix_from_index;
use crate::partitioning::hash::{HashValue, NameHasher};
use crate::types::PartitionIndex;

/// Whether a name with `hash` belongs in the newly created `new_index`.
#[inline]
pub fn hash_moves_to(hash: &HashValue, new_index: PartitionIndex) -> bool {
    hash.low_bits(radix_from_index(new_index)) == new_index
}

/// Whether `name` must move into the newly created partition `new_index`.
pub fn file_migration_status(name: &[u8], new_index: PartitionIndex) -> Result<bool> {
    let moves = hash_moves_to(&NameHasher::default().hash(name)?, new_index);
    tracing::trace!(new_index, moves, "checked migration status");
    Ok(moves)
}

/// Entries of a splitting partition sorted by destination.
#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    target: PartitionIndex,
    staying: Vec<Vec<u8>>,
    moving: Vec<Vec<u8>>,
}

impl MigrationPlan {
    /// Sort `names` for a split creating `target`, using the default hasher.
    pub fn build<I, N>(names: I, target: PartitionIndex) -> Result<Self>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<[u8]>,
    {
        Self::build_with(&NameHasher::default(), names, target)
    }

    /// Sort `names` for a split creating `target`.
    pub fn build_with<I, N>(hasher: &NameHasher, names: I, target: PartitionIndex) -> Result<Self>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<[u8]>,
    {
        let mut plan = Self {
            target,
            ..Default::default()
        };
        for name in names {
            let name = name.as_ref();
            if hash_moves_to(&hasher.hash(name)?, target) {
                plan.moving.push(name.to_vec());
            } else {
                plan.staying.push(name.to_vec());
            }
        }
        tracing::debug!(
            target_index = target,
            moving = plan.moving.len(),
            staying = plan.staying.len(),
            "built migration plan"
        );
        Ok(plan)
    }

    /// Partition receiving the moved entries.
    pub fn target(&self) -> PartitionIndex {
        self.target
    }

    /// Names that remain in the splitting partition.
    pub fn staying(&self) -> &[Vec<u8>] {
        &self.staying
    }

    /// Names that move to the target.
    pub fn moving(&self) -> &[Vec<u8>] {
        &self.moving
    }

    /// Total number of names examined.
    pub fn total(&self) -> usize {
        self.staying.len() + self.moving.len()
    }

    /// Check if nothing moves.
    pub fn is_noop(&self) -> bool {
        self.moving.is_empty()
    }
}
