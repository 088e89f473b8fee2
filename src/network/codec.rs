//! Wire forms of a [`Mapping`].
//!
//! Two encodings are provided: the serde form through bincode, used when a
//! mapping travels inside a larger message, and a fixed-width frame with a
//! trailing checksum for standalone transfers.
//!
//! # Frame Format
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │ ZEROTH_SERVER: u32                              │
//! ├─────────────────────────────────────────────────┤
//! │ SERVER_COUNT: u32                               │
//! ├─────────────────────────────────────────────────┤
//! │ RADIX: u32 (informational, recomputed on read)  │
//! ├─────────────────────────────────────────────────┤
//! │ WORD_COUNT: u32                                 │
//! ├─────────────────────────────────────────────────┤
//! │ WORDS: [u64; WORD_COUNT]                        │
//! ├─────────────────────────────────────────────────┤
//! │ CRC32: u32 (ISCSI, over all preceding bytes)    │
//! └─────────────────────────────────────────────────┘
//!
//! All integers big-endian.
//! ```

use crate::error::{CodecError, Result};
use crate::partitioning::bitmap::BITMAP_WORDS;
use crate::partitioning::mapping::Mapping;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc::{Crc, CRC_32_ISCSI};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Size of the fixed header in bytes.
pub const FRAME_HEADER_SIZE: usize = 16;

/// Size of the trailing checksum in bytes.
pub const FRAME_CHECKSUM_SIZE: usize = 4;

/// Encode a mapping with bincode.
pub fn encode_mapping(mapping: &Mapping) -> Result<Vec<u8>> {
    Ok(bincode::serialize(mapping)?)
}

/// Decode a mapping with bincode, validating it.
pub fn decode_mapping(data: &[u8]) -> Result<Mapping> {
    Ok(bincode::deserialize(data)?)
}

/// Encode a mapping as a checksummed frame.
///
/// Trailing empty words are left out.
pub fn frame_mapping(mapping: &Mapping) -> Bytes {
    let words = mapping.bitmap().words();
    let used = words
        .iter()
        .rposition(|&w| w != 0)
        .map_or(1, |last| last + 1);

    let mut buf =
        BytesMut::with_capacity(FRAME_HEADER_SIZE + used * 8 + FRAME_CHECKSUM_SIZE);
    buf.put_u32(mapping.zeroth_server());
    buf.put_u32(mapping.server_count());
    buf.put_u32(mapping.radix());
    // At most BITMAP_WORDS.
    buf.put_u32(used as u32);
    for &word in &words[..used] {
        buf.put_u64(word);
    }
    let checksum = CRC32.checksum(&buf);
    buf.put_u32(checksum);
    buf.freeze()
}

/// Decode a frame produced by [`frame_mapping`].
///
/// The slice must hold exactly one frame.
pub fn unframe_mapping(frame: &[u8]) -> Result<Mapping> {
    let minimum = FRAME_HEADER_SIZE + FRAME_CHECKSUM_SIZE;
    if frame.len() < minimum {
        return Err(CodecError::Truncated {
            needed: minimum,
            available: frame.len(),
        }
        .into());
    }

    let mut header = &frame[..FRAME_HEADER_SIZE];
    let zeroth_server = header.get_u32();
    let server_count = header.get_u32();
    let radix = header.get_u32();
    let word_count = header.get_u32() as usize;

    if word_count > BITMAP_WORDS {
        return Err(CodecError::TooManyWords(word_count).into());
    }
    let needed = minimum + word_count * 8;
    if frame.len() < needed {
        return Err(CodecError::Truncated {
            needed,
            available: frame.len(),
        }
        .into());
    }
    if frame.len() > needed {
        return Err(CodecError::TrailingBytes {
            expected: needed,
            actual: frame.len(),
        }
        .into());
    }

    let body_len = needed - FRAME_CHECKSUM_SIZE;
    let expected = (&frame[body_len..needed]).get_u32();
    let actual = CRC32.checksum(&frame[..body_len]);
    if expected != actual {
        return Err(CodecError::ChecksumMismatch { expected, actual }.into());
    }

    let mut body = &frame[FRAME_HEADER_SIZE..body_len];
    let words: Vec<u64> = (0..word_count).map(|_| body.get_u64()).collect();
    let mapping = Mapping::from_bitmap(&words, zeroth_server, server_count)?;
    if mapping.radix() != radix {
        tracing::warn!(
            framed = radix,
            recomputed = mapping.radix(),
            "framed radix disagrees with bitmap"
        );
    }
    Ok(mapping)
}
