//! Hash-based directory partitioning.
//!
//! Each directory is split into partitions addressed by the low bits of a
//! name's hash. A per-directory [`Mapping`] records which partitions exist;
//! a partition that grows too large splits, handing roughly half of its
//! entries to a new child address.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PartitionRouter                          │
//! │                                                              │
//! │  name ─► hash ─► low radix bits ─► candidate                 │
//! │                                      │                       │
//! │                 bit unset? ◄─────────┘                       │
//! │                 └─► parent(candidate) ... ─► present index   │
//! │                                                              │
//! │  index ─► (index + zeroth_server) % server_count ─► server   │
//! │                                                              │
//! │  split: index ─► first absent child(index, r) ─► new index   │
//! │         entries with low_bits(radix(new)) == new ─► move     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use gigaplus::partitioning::{index_for_file, index_for_splitting, apply_split, Mapping};
//!
//! let mut mapping = Mapping::new(0, 4);
//! let child = index_for_splitting(&mapping, 0)?;
//! apply_split(&mut mapping, child)?;
//!
//! let index = index_for_file(&mapping, b"report.txt")?;
//! assert!(mapping.bit_status(index));
//! ```

pub mod bitmap;
pub mod hash;
pub mod mapping;
pub mod migration;
pub mod resolver;
pub mod split;

pub use bitmap::{
    child_index, parent_index, radix_from_bitmap, radix_from_index, Bitmap, BITMAP_CAPACITY,
    MAX_RADIX,
};
pub use hash::{hash_name, HashValue, NameHasher, DEFAULT_MAX_NAME_LEN};
pub use mapping::{CopyMode, Mapping};
pub use migration::{file_migration_status, MigrationPlan};
pub use resolver::{
    bucket_num_for_server, index_for_file, index_for_hash, placement_for_file,
    placement_for_index, server_for_file, server_for_index, PartitionRouter,
};
pub use split::{
    apply_split, index_for_backup, index_for_force_splitting, index_for_splitting,
    is_splittable, undo_split, SplitPolicy, SplitTransaction,
};
