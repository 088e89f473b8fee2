//! Hash-based partitioning of large directories across servers.
//!
//! A directory starts as a single partition on one server. When a partition
//! grows too large it splits: a new partition address is materialized and
//! the entries whose name hashes fall into it move there. Clients route a
//! name by hashing it and walking a small presence bitmap, so a stale copy
//! of the bitmap still routes correctly, just to an ancestor partition.
//!
//! This crate provides:
//! - **Mapping** bitmaps with their radix and server metadata
//! - **Resolution** of names to partitions and partitions to servers
//! - **Split planning** under configurable policies, with a local
//!   split state machine and migration planning
//! - **MappingCache**, a bounded per-directory cache built on Moka
//! - Wire encodings for exchanging mappings between servers
//!
//! # Example
//!
//! ```rust,no_run
//! use gigaplus::{GigaConfig, MappingCache, ServerList};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     gigaplus::logging::init();
//!
//!     let servers = ServerList::parse("10.0.0.1:7000\n10.0.0.2:7000\n", Some("10.0.0.1:7000"));
//!     let cache = MappingCache::new(&GigaConfig::new(servers))?;
//!
//!     let dir = 17;
//!     cache.get_or_insert(dir, 0)?;
//!
//!     // Split the root partition once the directory grows.
//!     if let Some(mut txn) = cache.begin_split(dir, 0)? {
//!         // ... move the entries listed by txn.plan_migration(..) ...
//!         cache.commit_split(dir, &mut txn)?;
//!     }
//!
//!     if let Some(placement) = cache.resolve(dir, b"report.pdf")? {
//!         println!("partition {} on server {}", placement.index, placement.server);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │        Routing / RPC layer (external)        │
//! └─────────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────────┐
//! │               MappingCache                   │
//! │  • resolve(dir, name) -> Placement           │
//! │  • refresh(dir, update)                      │
//! │  • begin/commit/abort split                  │
//! └─────────────────────────────────────────────┘
//!                     │
//!     ┌───────────────┼───────────────┐
//!     ▼               ▼               ▼
//! ┌─────────┐   ┌──────────┐   ┌──────────┐
//! │ Mapping │   │ Resolver │   │  Split   │
//! │ bitmap  │   │  + hash  │   │ planner  │
//! └─────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Consistency Model
//!
//! - Bitmaps only gain bits through merges, so copies converge.
//! - Each cached mapping has a single writer at a time; readers never
//!   observe a bitmap without its recomputed radix.
//! - Applying a split more than once is harmless for the bitmap, but the
//!   data move behind it must happen at most once; that is the caller's job.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod network;
pub mod partitioning;
pub mod path;
pub mod testing;
pub mod types;

// Re-exports for convenience
pub use cache::MappingCache;
pub use config::{GigaConfig, ServerList};
pub use error::{CodecError, Error, InvariantError, Result};
pub use types::{DirId, PartitionIndex, Placement, ServerId, SplitState};

// Partitioning exports
pub use partitioning::{
    index_for_file, server_for_index, CopyMode, HashValue, Mapping, MigrationPlan,
    NameHasher, PartitionRouter, SplitPolicy, SplitTransaction,
};

// Metrics exports
pub use metrics::{IndexMetrics, MetricsSnapshot};

// Path exports
pub use path::{parse_path_components, PathComponents};
