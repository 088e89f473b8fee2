//! Core types used throughout the partition index.

use serde::{Deserialize, Serialize};

/// Address of a partition in the implicit binary split tree.
pub type PartitionIndex = u32;

/// Physical server number.
pub type ServerId = u32;

/// Identifier of a directory whose entries are partitioned.
pub type DirId = u64;

/// Where a name lives: its partition, the server that hosts the partition,
/// and the partition's slot in that server's local list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    /// Owning partition address.
    pub index: PartitionIndex,
    /// Server hosting the partition.
    pub server: ServerId,
    /// Position within the server's local partition list.
    pub bucket: u32,
}

/// Lifecycle of a single partition address.
///
/// `Absent -> Splitting -> Present`, with `Splitting -> Absent` on abort.
/// Nothing leaves `Present`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitState {
    /// Address not materialized.
    Absent,
    /// Entries are being migrated; the bit is still unset.
    Splitting,
    /// Bit set in the mapping.
    Present,
}

impl std::fmt::Display for SplitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitState::Absent => write!(f, "absent"),
            SplitState::Splitting => write!(f, "splitting"),
            SplitState::Present => write!(f, "present"),
        }
    }
}

impl SplitState {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SplitState::Present)
    }

    /// Check whether moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: SplitState) -> bool {
        matches!(
            (self, next),
            (SplitState::Absent, SplitState::Splitting)
                | (SplitState::Splitting, SplitState::Present)
                | (SplitState::Splitting, SplitState::Absent)
        )
    }
}
