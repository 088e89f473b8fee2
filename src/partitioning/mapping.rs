//! Per-directory partition mapping.
//!
//! A [`Mapping`] is the presence bitmap of a directory's partitions plus the
//! metadata needed to place partitions on servers. The radix is a cache of
//! the bitmap's highest present address and is recomputed on every change;
//! it is never assigned independently.

use crate::error::{Error, InvariantError, Result};
use crate::partitioning::bitmap::{
    radix_from_index, Bitmap, BITMAP_WORDS, BITS_PER_WORD,
};
use crate::partitioning::split::SplitPolicy;
use crate::types::{PartitionIndex, ServerId};
use serde::{Deserialize, Serialize};

/// How [`Mapping::copy_from`] treats the source bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// Reinitialize fresh, keeping only the source's server metadata.
    Shallow,
    /// Copy the bitmap bit for bit.
    Deep,
}

/// Partition presence bitmap with its derived radix and server metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMapping", into = "RawMapping")]
pub struct Mapping {
    bitmap: Bitmap,
    curr_radix: u32,
    zeroth_server: ServerId,
    server_count: u32,
}

impl Mapping {
    /// Create a mapping holding only the root partition.
    ///
    /// A `server_count` of 0 is treated as 1.
    pub fn new(zeroth_server: ServerId, server_count: u32) -> Self {
        let mut mapping = Self {
            bitmap: Bitmap::with_first_word(1),
            curr_radix: 0,
            zeroth_server,
            server_count: server_count.max(1),
        };
        mapping.refresh_radix();
        mapping
    }

    /// Create a mapping for `policy`.
    ///
    /// `NeverSplit` starts with partitions `0..initial_partitions` present,
    /// which must fit in one bitmap word. Every other policy starts with
    /// the root partition only.
    pub fn init(
        policy: SplitPolicy,
        initial_partitions: Option<u32>,
        zeroth_server: ServerId,
        server_count: u32,
    ) -> Result<Self> {
        tracing::debug!(%policy, ?initial_partitions, zeroth_server, server_count, "initializing mapping");

        let mut mapping = Self::new(zeroth_server, server_count);
        if policy == SplitPolicy::NeverSplit {
            let count = initial_partitions.ok_or_else(|| {
                Error::Config("never_split requires an initial partition count".into())
            })?;
            let word = match count {
                0 => {
                    return Err(Error::Config(
                        "initial partition count must be at least 1".into(),
                    ))
                }
                n if n < BITS_PER_WORD => (1u64 << n) - 1,
                n if n == BITS_PER_WORD => u64::MAX,
                n => {
                    return Err(Error::Config(format!(
                        "initial partition count {} exceeds bitmap word width {}",
                        n, BITS_PER_WORD
                    )))
                }
            };
            mapping.bitmap = Bitmap::with_first_word(word);
            mapping.refresh_radix();
        }
        Ok(mapping)
    }

    /// Create a mapping from raw bitmap words.
    ///
    /// Words beyond the local capacity are ignored if empty; a set bit
    /// there is an error. The source must contain the root partition.
    pub fn from_bitmap(words: &[u64], zeroth_server: ServerId, server_count: u32) -> Result<Self> {
        if words.first().map_or(true, |w| w & 1 == 0) {
            return Err(InvariantError::MissingRoot.into());
        }
        if let Some(offset) = words.iter().skip(BITMAP_WORDS).position(|&w| w != 0) {
            return Err(InvariantError::BitmapOverflow {
                word: BITMAP_WORDS + offset,
            }
            .into());
        }

        let mut mapping = Self::new(zeroth_server, server_count);
        for (dst, src) in mapping.bitmap.words_mut().iter_mut().zip(words) {
            *dst = *src;
        }
        mapping.refresh_radix();
        tracing::debug!(radix = mapping.curr_radix, bitmap = %mapping.bitmap, "mapping initialized from bitmap");
        Ok(mapping)
    }

    /// Overwrite this mapping from `src`.
    ///
    /// `Shallow` resets to a fresh mapping with the source's server metadata.
    /// `Deep` copies the bitmap; server metadata is left untouched.
    pub fn copy_from(&mut self, src: &Mapping, mode: CopyMode) {
        match mode {
            CopyMode::Shallow => {
                *self = Self::new(src.zeroth_server, src.server_count);
            }
            CopyMode::Deep => {
                self.bitmap = src.bitmap;
                self.refresh_radix();
            }
        }
        tracing::debug!(?mode, mapping = %self, "copied mapping");
    }

    /// Fold a fresher copy into this one.
    ///
    /// Presence bits are unioned, so a known partition is never forgotten;
    /// the server count only grows.
    pub fn merge_update(&mut self, update: &Mapping) {
        if update.zeroth_server != self.zeroth_server {
            tracing::warn!(
                current = self.zeroth_server,
                update = update.zeroth_server,
                "merging mapping with a different zeroth server"
            );
        }
        self.bitmap.union_with(&update.bitmap);
        self.refresh_radix();
        self.server_count = self.server_count.max(update.server_count);
        tracing::debug!(mapping = %self, "merged mapping update");
    }

    /// Mark `index` present.
    pub fn set_bit(&mut self, index: PartitionIndex) -> Result<()> {
        self.bitmap.set(index)?;
        self.refresh_radix();
        tracing::debug!(index, radix = self.curr_radix, "set partition bit");
        Ok(())
    }

    /// Mark `index` absent. The root partition cannot be cleared.
    pub fn clear_bit(&mut self, index: PartitionIndex) -> Result<()> {
        if index == 0 {
            return Err(InvariantError::RootRemoval.into());
        }
        self.bitmap.clear(index)?;
        self.refresh_radix();
        tracing::debug!(index, radix = self.curr_radix, "cleared partition bit");
        Ok(())
    }

    /// Whether partition `index` is present.
    #[inline]
    pub fn bit_status(&self, index: PartitionIndex) -> bool {
        self.bitmap.is_set(index)
    }

    /// Number of low-order hash bits currently used for addressing.
    ///
    /// Always derived from the highest present partition, so a mapping
    /// holding only the root reports 0. Names still resolve to partition 0.
    #[inline]
    pub fn radix(&self) -> u32 {
        self.curr_radix
    }

    /// Offset added before mapping a partition to a server.
    pub fn zeroth_server(&self) -> ServerId {
        self.zeroth_server
    }

    /// Number of servers partitions are spread across (always >= 1).
    pub fn server_count(&self) -> u32 {
        self.server_count
    }

    /// The presence bitmap.
    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    /// Present partitions in ascending order.
    pub fn partitions(&self) -> impl Iterator<Item = PartitionIndex> + '_ {
        self.bitmap.iter()
    }

    /// Number of present partitions.
    pub fn partition_count(&self) -> u32 {
        self.bitmap.count()
    }

    fn refresh_radix(&mut self) {
        // Root bit is pinned, so the bitmap is never empty here.
        self.curr_radix = self.bitmap.highest_set_bit().map_or(0, radix_from_index);
    }
}

impl std::fmt::Display for Mapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "radix={} zeroth_server={} server_count={} bitmap={}",
            self.curr_radix, self.zeroth_server, self.server_count, self.bitmap
        )
    }
}

/// Wire shape of a mapping: words plus three integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawMapping {
    bitmap: Vec<u64>,
    curr_radix: u32,
    zeroth_server: ServerId,
    server_count: u32,
}

impl From<Mapping> for RawMapping {
    fn from(mapping: Mapping) -> Self {
        Self {
            bitmap: mapping.bitmap.words().to_vec(),
            curr_radix: mapping.curr_radix,
            zeroth_server: mapping.zeroth_server,
            server_count: mapping.server_count,
        }
    }
}

impl TryFrom<RawMapping> for Mapping {
    type Error = Error;

    fn try_from(raw: RawMapping) -> Result<Self> {
        let mapping = Mapping::from_bitmap(&raw.bitmap, raw.zeroth_server, raw.server_count)?;
        if mapping.curr_radix != raw.curr_radix {
            tracing::warn!(
                received = raw.curr_radix,
                recomputed = mapping.curr_radix,
                "received mapping radix disagrees with its bitmap"
            );
        }
        Ok(mapping)
    }
}
