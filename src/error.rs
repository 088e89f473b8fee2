//! Error types for the partition index.

use crate::types::{PartitionIndex, SplitState};
use std::io;
use thiserror::Error;

/// Result type alias for partition index operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the partition index.
#[derive(Error, Debug)]
pub enum Error {
    /// Illegal split-policy or startup configuration.
    #[error("config error: {0}")]
    Config(String),

    /// A mapping invariant does not hold.
    #[error("invariant violation: {0}")]
    Invariant(#[from] InvariantError),

    /// The requested behavior has no defined semantics.
    #[error("not implemented: {0}")]
    Unimplemented(&'static str),

    /// Name exceeds the configured maximum length.
    #[error("name too long: {len} bytes (max {max})")]
    NameTooLong { len: usize, max: usize },

    /// Path could not be split into directory and file components.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Encoding or decoding failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// I/O error while loading configuration.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Short, stable label for the error kind (used as a metrics label).
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Invariant(_) => "invariant",
            Error::Unimplemented(_) => "unimplemented",
            Error::NameTooLong { .. } => "name_too_long",
            Error::InvalidPath(_) => "invalid_path",
            Error::Codec(_) => "codec",
            Error::Io(_) => "io",
        }
    }

    /// Whether the owning layer should drop its cached mapping and refetch it.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Error::Invariant(_))
    }
}

/// Violations of the bitmap/mapping invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    /// No bit is set anywhere in the bitmap.
    #[error("bitmap has no partitions")]
    EmptyBitmap,

    /// The root partition (address 0) is missing from a source bitmap.
    #[error("root partition 0 is not present")]
    MissingRoot,

    /// Attempt to clear the root partition.
    #[error("root partition 0 cannot be removed")]
    RootRemoval,

    /// A partition expected to be present is absent.
    #[error("partition {0} is not present")]
    PartitionAbsent(PartitionIndex),

    /// No free child address is left below the maximum radix.
    #[error("address space exhausted splitting partition {index} (max radix {max_radix})")]
    AddressSpaceExhausted {
        index: PartitionIndex,
        max_radix: u32,
    },

    /// Address does not fit the bitmap.
    #[error("partition {index} out of range (capacity {capacity})")]
    AddressOutOfRange {
        index: PartitionIndex,
        capacity: u32,
    },

    /// Split state machine moved along an edge it does not have.
    #[error("partition {index}: illegal split transition {from} -> {to}")]
    IllegalTransition {
        index: PartitionIndex,
        from: SplitState,
        to: SplitState,
    },

    /// A source bitmap carries partitions beyond the local capacity.
    #[error("bitmap word {word} lies beyond capacity and is not empty")]
    BitmapOverflow { word: usize },
}

/// Encoding and decoding errors.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Textual hash form is malformed.
    #[error("invalid hash encoding: {0}")]
    InvalidHashEncoding(String),

    /// Frame ended before all fields were read.
    #[error("truncated frame: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// Bytes follow the checksum.
    #[error("trailing bytes after frame: expected {expected} bytes, got {actual}")]
    TrailingBytes { expected: usize, actual: usize },

    /// Frame declares more words than a bitmap can hold.
    #[error("frame declares {0} bitmap words")]
    TooManyWords(usize),

    /// Frame checksum does not match its contents.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// Serde serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Codec(CodecError::Serialization(e.to_string()))
    }
}
