//! Test fixtures and scenario tests for the partition index.
//!
//! The fixtures build mappings and pick names by hash so that tests can
//! state which partition a name must land in:
//!
//! ```rust,ignore
//! use gigaplus::testing::{grow_by_splits, names_with_low_bits};
//!
//! let mut mapping = Mapping::new(0, 4);
//! let created = grow_by_splits(&mut mapping, &[0, 0, 1]);
//! let names = names_with_low_bits(2, 3, 10);
//! ```

use crate::error::Result;
use crate::partitioning::hash::hash_name;
use crate::partitioning::mapping::Mapping;
use crate::partitioning::split::{apply_split, index_for_splitting};
use crate::types::{PartitionIndex, ServerId};

#[cfg(test)]
mod cache_scenario_tests;
#[cfg(test)]
mod property_tests;

/// Mapping with the root plus every partition in `indices`.
pub fn mapping_with(
    indices: &[PartitionIndex],
    zeroth_server: ServerId,
    server_count: u32,
) -> Result<Mapping> {
    let mut mapping = Mapping::new(zeroth_server, server_count);
    for &index in indices {
        mapping.set_bit(index)?;
    }
    Ok(mapping)
}

/// Split present partitions of `mapping` the way a running server would.
///
/// Each choice picks a present partition by position (modulo the number
/// present) and splits it. Partitions with no free child are skipped.
/// Returns the created addresses in order.
pub fn grow_by_splits(mapping: &mut Mapping, choices: &[usize]) -> Vec<PartitionIndex> {
    let mut created = Vec::new();
    for &choice in choices {
        let present: Vec<PartitionIndex> = mapping.partitions().collect();
        let parent = present[choice % present.len()];
        if let Ok(child) = index_for_splitting(mapping, parent) {
            if apply_split(mapping, child).is_ok() {
                created.push(child);
            }
        }
    }
    created
}

/// `count` distinct names whose hash has `value` in its low `radix` bits.
///
/// Returns an empty list if `value` does not fit in `radix` bits.
pub fn names_with_low_bits(radix: u32, value: PartitionIndex, count: usize) -> Vec<String> {
    if radix < PartitionIndex::BITS && value >> radix != 0 {
        return Vec::new();
    }

    (0u64..)
        .map(|i| format!("entry-{}", i))
        .filter(|name| {
            hash_name(name.as_bytes())
                .map(|hash| hash.low_bits(radix) == value)
                .unwrap_or(false)
        })
        .take(count)
        .collect()
}

/// `count` names that resolve to partition `index` under `mapping`.
///
/// Returns an empty list if `index` is not present.
pub fn names_resolving_to(mapping: &Mapping, index: PartitionIndex, count: usize) -> Vec<String> {
    use crate::partitioning::resolver::index_for_file;

    if !mapping.bit_status(index) {
        return Vec::new();
    }

    (0u64..)
        .map(|i| format!("entry-{}", i))
        .filter(|name| {
            index_for_file(mapping, name.as_bytes())
                .map(|resolved| resolved == index)
                .unwrap_or(false)
        })
        .take(count)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_with() {
        let mapping = mapping_with(&[1, 3], 2, 5).unwrap();
        assert_eq!(mapping.partitions().collect::<Vec<_>>(), vec![0, 1, 3]);
        assert_eq!(mapping.zeroth_server(), 2);
        assert!(mapping_with(&[5000], 0, 1).is_err());
    }

    #[test]
    fn test_grow_by_splits() {
        let mut mapping = Mapping::new(0, 4);
        let created = grow_by_splits(&mut mapping, &[0, 0, 1]);
        // Split 0 -> 1, split 0 -> 2, then the second present partition (1) -> 3.
        assert_eq!(created, vec![1, 2, 3]);
        assert_eq!(mapping.partition_count(), 4);
    }

    #[test]
    fn test_names_with_low_bits() {
        let names = names_with_low_bits(3, 5, 8);
        assert_eq!(names.len(), 8);
        for name in &names {
            assert_eq!(hash_name(name.as_bytes()).unwrap().low_bits(3), 5);
        }
        assert!(names_with_low_bits(2, 4, 1).is_empty());
    }

    #[test]
    fn test_names_resolving_to() {
        let mapping = mapping_with(&[1, 4], 0, 4).unwrap();
        for index in [0, 1, 4] {
            for name in names_resolving_to(&mapping, index, 5) {
                assert_eq!(
                    crate::partitioning::resolver::index_for_file(&mapping, name.as_bytes())
                        .unwrap(),
                    index
                );
            }
        }
        assert!(names_resolving_to(&mapping, 2, 1).is_empty());
    }
}
