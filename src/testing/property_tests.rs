//! Property tests over randomly grown mappings.

use super::*;
use crate::partitioning::bitmap::{parent_index, BITMAP_WORDS};
use crate::partitioning::mapping::CopyMode;
use crate::partitioning::migration::file_migration_status;
use crate::partitioning::resolver::{bucket_num_for_server, index_for_file, server_for_index};
use crate::partitioning::split::{is_splittable, SplitPolicy};
use proptest::prelude::*;

fn grown(choices: &[usize], zeroth: ServerId, count: u32) -> Mapping {
    let mut mapping = Mapping::new(zeroth, count);
    grow_by_splits(&mut mapping, choices);
    mapping
}

fn choices() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(any::<usize>(), 0..40)
}

fn arbitrary_mapping() -> impl Strategy<Value = Mapping> {
    (
        prop::collection::vec(any::<u64>(), BITMAP_WORDS),
        any::<u32>(),
        1u32..64,
    )
        .prop_map(|(mut words, zeroth, count)| {
            words[0] |= 1;
            Mapping::from_bitmap(&words, zeroth, count).unwrap()
        })
}

proptest! {
    /// Property: merging a mapping into itself changes nothing
    #[test]
    fn prop_merge_idempotent(mapping in arbitrary_mapping()) {
        let mut merged = mapping.clone();
        merged.merge_update(&mapping);
        prop_assert_eq!(merged, mapping);
    }

    /// Property: merge keeps every bit of both inputs and the larger server count
    #[test]
    fn prop_merge_monotonic(curr in arbitrary_mapping(), update in arbitrary_mapping()) {
        let mut merged = curr.clone();
        merged.merge_update(&update);

        prop_assert!(merged.bitmap().contains_all(curr.bitmap()));
        prop_assert!(merged.bitmap().contains_all(update.bitmap()));
        prop_assert_eq!(
            merged.partition_count(),
            curr.partitions().chain(update.partitions())
                .collect::<std::collections::BTreeSet<_>>()
                .len() as u32
        );
        prop_assert_eq!(merged.server_count(), curr.server_count().max(update.server_count()));
        prop_assert_eq!(merged.zeroth_server(), curr.zeroth_server());
    }

    /// Property: a deep copy reproduces bitmap and radix
    #[test]
    fn prop_deep_copy_round_trip(src in arbitrary_mapping(), zeroth in any::<u32>(), count in 1u32..16) {
        let mut dest = Mapping::new(zeroth, count);
        dest.copy_from(&src, CopyMode::Deep);
        prop_assert_eq!(dest.bitmap(), src.bitmap());
        prop_assert_eq!(dest.radix(), src.radix());
    }

    /// Property: resolution always lands on a present partition
    #[test]
    fn prop_resolution_hits_present_partition(
        mapping in arbitrary_mapping(),
        name in "[a-z0-9._-]{1,40}",
    ) {
        let index = index_for_file(&mapping, name.as_bytes()).unwrap();
        prop_assert!(mapping.bit_status(index));
    }

    /// Property: the migration oracle agrees with the resolver after a split
    #[test]
    fn prop_oracle_agrees_with_resolver(
        choices in choices(),
        parent_choice in any::<usize>(),
        names in prop::collection::vec("[a-z0-9]{1,16}", 1..30),
    ) {
        let mut mapping = grown(&choices, 0, 4);
        let present: Vec<PartitionIndex> = mapping.partitions().collect();
        let parent = present[parent_choice % present.len()];
        let Ok(child) = index_for_splitting(&mapping, parent) else {
            return Ok(());
        };

        let before: Vec<PartitionIndex> = names
            .iter()
            .map(|n| index_for_file(&mapping, n.as_bytes()).unwrap())
            .collect();
        apply_split(&mut mapping, child).unwrap();

        for (name, old) in names.iter().zip(before) {
            let moves = file_migration_status(name.as_bytes(), child).unwrap();
            let now = index_for_file(&mapping, name.as_bytes()).unwrap();
            prop_assert_eq!(moves && old == parent, now == child);
            if now != child {
                prop_assert_eq!(now, old);
            }
        }
    }

    /// Property: the split target is a fresh child of its source
    #[test]
    fn prop_split_target_is_fresh_child(choices in choices(), parent_choice in any::<usize>()) {
        let mapping = grown(&choices, 0, 1);
        let present: Vec<PartitionIndex> = mapping.partitions().collect();
        let parent = present[parent_choice % present.len()];
        if let Ok(child) = index_for_splitting(&mapping, parent) {
            prop_assert_ne!(child, parent);
            prop_assert!(!mapping.bit_status(child));
            prop_assert_eq!(parent_index(child), parent);
        }
    }

    /// Property: server and bucket are always in range
    #[test]
    fn prop_server_in_range(
        index in 0u32..1024,
        zeroth in any::<u32>(),
        count in 1u32..=u32::MAX,
    ) {
        let mapping = Mapping::new(zeroth, count);
        prop_assert!(server_for_index(&mapping, index) < count);
        prop_assert!(bucket_num_for_server(&mapping, index) < count);
    }

    /// Property: NeverSplit refuses every address
    #[test]
    fn prop_never_split_refuses(mapping in arbitrary_mapping(), index in 0u32..2048, max in 0u32..8) {
        prop_assert!(!is_splittable(&mapping, index, SplitPolicy::NeverSplit, max).unwrap());
    }
}
