//! Presence bitmap over the implicit binary split tree.
//!
//! Partition address `a` lives in word `a / 64`, bit `a % 64` (LSB first).
//! The tree is never materialized: a node's children and parent are pure
//! arithmetic on its address.
//!
//! ```text
//!                 0
//!        ┌────────┼─────────┬──────────┐
//!        1        2         4          8 ...     child(0, r) = 2^r
//!    ┌───┴──┐     ├───┐     │
//!    3      5     6   10   12 ...                child(a, r) = a + 2^r
//! ```

use crate::error::{InvariantError, Result};
use crate::types::PartitionIndex;
use serde::{Deserialize, Serialize};

/// Width of one bitmap word in bits.
pub const BITS_PER_WORD: u32 = u64::BITS;

/// Number of words in a bitmap.
pub const BITMAP_WORDS: usize = 16;

/// Number of addressable partitions.
pub const BITMAP_CAPACITY: u32 = BITMAP_WORDS as u32 * BITS_PER_WORD;

/// Largest radix usable for addressing (`2^MAX_RADIX == BITMAP_CAPACITY`).
pub const MAX_RADIX: u32 = BITMAP_CAPACITY.trailing_zeros();

/// Number of low-order hash bits needed to tell partition `index` apart
/// from its siblings: 0 for the root, otherwise the bit length of `index`.
#[inline]
pub fn radix_from_index(index: PartitionIndex) -> u32 {
    PartitionIndex::BITS - index.leading_zeros()
}

/// Child created by splitting `index` at `radix`: `index + 2^radix`.
///
/// Returns `None` if the address would not fit a `PartitionIndex`.
#[inline]
pub fn child_index(index: PartitionIndex, radix: u32) -> Option<PartitionIndex> {
    1u32.checked_shl(radix)
        .and_then(|step| index.checked_add(step))
}

/// Parent of `index`: the address with its highest set bit cleared.
#[inline]
pub fn parent_index(index: PartitionIndex) -> PartitionIndex {
    match index {
        0 => 0,
        _ => index & !(1 << (PartitionIndex::BITS - 1 - index.leading_zeros())),
    }
}

/// Radix of a bitmap: `radix_from_index` of its highest present partition.
pub fn radix_from_bitmap(bitmap: &Bitmap) -> Result<u32> {
    let highest = bitmap
        .highest_set_bit()
        .ok_or(InvariantError::EmptyBitmap)?;
    Ok(radix_from_index(highest))
}

/// Fixed-capacity presence vector of partition addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bitmap {
    words: [u64; BITMAP_WORDS],
}

impl Default for Bitmap {
    fn default() -> Self {
        Self::new()
    }
}

impl Bitmap {
    /// Create an all-zero bitmap.
    pub const fn new() -> Self {
        Self {
            words: [0; BITMAP_WORDS],
        }
    }

    /// Create a bitmap whose first word is `word`.
    pub(crate) fn with_first_word(word: u64) -> Self {
        let mut bitmap = Self::new();
        bitmap.words[0] = word;
        bitmap
    }

    /// Raw words, lowest addresses first.
    pub fn words(&self) -> &[u64; BITMAP_WORDS] {
        &self.words
    }

    pub(crate) fn words_mut(&mut self) -> &mut [u64; BITMAP_WORDS] {
        &mut self.words
    }

    #[inline]
    fn locate(index: PartitionIndex) -> Result<(usize, u64)> {
        if index >= BITMAP_CAPACITY {
            return Err(InvariantError::AddressOutOfRange {
                index,
                capacity: BITMAP_CAPACITY,
            }
            .into());
        }
        let word = (index / BITS_PER_WORD) as usize;
        let mask = 1u64 << (index % BITS_PER_WORD);
        Ok((word, mask))
    }

    /// Set the bit for `index`.
    pub fn set(&mut self, index: PartitionIndex) -> Result<()> {
        let (word, mask) = Self::locate(index)?;
        self.words[word] |= mask;
        Ok(())
    }

    /// Clear the bit for `index`.
    pub fn clear(&mut self, index: PartitionIndex) -> Result<()> {
        let (word, mask) = Self::locate(index)?;
        self.words[word] &= !mask;
        Ok(())
    }

    /// Check whether `index` is present. Out-of-range addresses are absent.
    #[inline]
    pub fn is_set(&self, index: PartitionIndex) -> bool {
        match Self::locate(index) {
            Ok((word, mask)) => self.words[word] & mask != 0,
            Err(_) => false,
        }
    }

    /// Highest present address, scanning from the most significant word down.
    pub fn highest_set_bit(&self) -> Option<PartitionIndex> {
        self.words
            .iter()
            .enumerate()
            .rev()
            .find(|(_, &word)| word != 0)
            .map(|(i, &word)| {
                i as u32 * BITS_PER_WORD + (BITS_PER_WORD - 1 - word.leading_zeros())
            })
    }

    /// Fold `other` into this bitmap (bitwise OR).
    pub fn union_with(&mut self, other: &Bitmap) {
        for (mine, theirs) in self.words.iter_mut().zip(other.words.iter()) {
            *mine |= *theirs;
        }
    }

    /// Whether every bit set in `other` is also set here.
    pub fn contains_all(&self, other: &Bitmap) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(mine, theirs)| mine & theirs == *theirs)
    }

    /// Number of present partitions.
    pub fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Check if no bit is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Iterate over present addresses in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = PartitionIndex> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let base = i as u32 * BITS_PER_WORD;
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros();
                rest &= rest - 1;
                Some(base + bit)
            })
        })
    }
}

impl std::fmt::Display for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Trailing zero words carry no information.
        let used = self
            .words
            .iter()
            .rposition(|&w| w != 0)
            .map_or(1, |i| i + 1);
        for word in &self.words[..used] {
            write!(f, "{:#x}|", word)?;
        }
        Ok(())
    }
}
