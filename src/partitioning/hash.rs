//! Name hashing.
//!
//! Names are digested with SHA-1; only the low-order bits of the digest
//! (read as a big-endian 160-bit integer) are used for addressing.

use crate::error::{CodecError, Error, Result};
use crate::types::PartitionIndex;
use sha1::{Digest, Sha1};

/// Digest size in bytes.
pub const HASH_SIZE: usize = 20;

/// Length of the textual (hex) digest form.
pub const HASH_HEX_LEN: usize = HASH_SIZE * 2;

/// Default upper bound on hashed name length, in bytes.
pub const DEFAULT_MAX_NAME_LEN: usize = 512;

/// Fixed-length digest of a name.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashValue([u8; HASH_SIZE]);

impl HashValue {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Lowercase hex form, always `HASH_HEX_LEN` characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the hex form produced by [`HashValue::to_hex`].
    pub fn from_hex(text: &str) -> Result<Self> {
        if text.len() != HASH_HEX_LEN {
            return Err(CodecError::InvalidHashEncoding(format!(
                "expected {} characters, got {}",
                HASH_HEX_LEN,
                text.len()
            ))
            .into());
        }
        let mut bytes = [0u8; HASH_SIZE];
        hex::decode_to_slice(text, &mut bytes)
            .map_err(|e| CodecError::InvalidHashEncoding(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// The low `radix` bits of the digest. Radixes above 32 are clamped.
    pub fn low_bits(&self, radix: u32) -> PartitionIndex {
        let mut tail = [0u8; 4];
        tail.copy_from_slice(&self.0[HASH_SIZE - 4..]);
        let tail = u32::from_be_bytes(tail);
        match radix {
            0 => 0,
            r if r >= PartitionIndex::BITS => tail,
            r => tail & ((1 << r) - 1),
        }
    }
}

impl std::fmt::Display for HashValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for HashValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HashValue({})", self.to_hex())
    }
}

impl std::str::FromStr for HashValue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// Hashes names, rejecting those longer than a configured bound.
#[derive(Debug, Clone, Copy)]
pub struct NameHasher {
    max_name_len: usize,
}

impl Default for NameHasher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NAME_LEN)
    }
}

impl NameHasher {
    /// Create a hasher accepting names up to `max_name_len` bytes.
    pub fn new(max_name_len: usize) -> Self {
        Self { max_name_len }
    }

    /// Maximum accepted name length.
    pub fn max_name_len(&self) -> usize {
        self.max_name_len
    }

    /// Digest `name`.
    pub fn hash(&self, name: &[u8]) -> Result<HashValue> {
        if name.len() > self.max_name_len {
            return Err(Error::NameTooLong {
                len: name.len(),
                max: self.max_name_len,
            });
        }
        let digest: [u8; HASH_SIZE] = Sha1::digest(name).into();
        let hash = HashValue(digest);
        tracing::trace!(len = name.len(), hash = %hash, "hashed name");
        Ok(hash)
    }
}

/// Digest `name` with the default length bound.
pub fn hash_name(name: &[u8]) -> Result<HashValue> {
    NameHasher::default().hash(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // SHA-1("abc")
        let hash = hash_name(b"abc").unwrap();
        assert_eq!(hash.to_hex(), "a9993e364706816aba3e25717850c26c9cd0d89d");

        // SHA-1("")
        let hash = hash_name(b"").unwrap();
        assert_eq!(hash.to_hex(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn test_deterministic() {
        let a = hash_name(b"file-42.txt").unwrap();
        let b = hash_name(b"file-42.txt").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, hash_name(b"file-43.txt").unwrap());
    }

    #[test]
    fn test_hex_roundtrip() {
        let hash = hash_name(b"some/name").unwrap();
        let text = hash.to_hex();
        assert_eq!(text.len(), HASH_HEX_LEN);
        assert_eq!(HashValue::from_hex(&text).unwrap(), hash);
        assert_eq!(text.parse::<HashValue>().unwrap(), hash);
        assert_eq!(hash.to_string(), text);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(matches!(
            HashValue::from_hex("abcd"),
            Err(Error::Codec(CodecError::InvalidHashEncoding(_)))
        ));
        let not_hex = "z".repeat(HASH_HEX_LEN);
        assert!(matches!(
            HashValue::from_hex(&not_hex),
            Err(Error::Codec(CodecError::InvalidHashEncoding(_)))
        ));
    }

    #[test]
    fn test_low_bits() {
        let mut bytes = [0u8; HASH_SIZE];
        bytes[HASH_SIZE - 1] = 0b1011_0110;
        bytes[HASH_SIZE - 2] = 0b0000_0011;
        bytes[0] = 0xff;
        let hash = HashValue::from_bytes(bytes);

        assert_eq!(hash.low_bits(0), 0);
        assert_eq!(hash.low_bits(1), 0);
        assert_eq!(hash.low_bits(2), 0b10);
        assert_eq!(hash.low_bits(3), 0b110);
        assert_eq!(hash.low_bits(8), 0b1011_0110);
        assert_eq!(hash.low_bits(9), 0b1_1011_0110);
        assert_eq!(hash.low_bits(10), 0b11_1011_0110);
        assert_eq!(hash.low_bits(16), 0b11_1011_0110);
        assert_eq!(hash.low_bits(40), 0b11_1011_0110);
    }

    #[test]
    fn test_low_bits_ignores_high_bytes() {
        let mut bytes = [0xffu8; HASH_SIZE];
        bytes[HASH_SIZE - 1] = 0;
        let hash = HashValue::from_bytes(bytes);
        assert_eq!(hash.low_bits(8), 0);
        assert_eq!(hash.low_bits(9), 0b1_0000_0000);
    }

    #[test]
    fn test_name_too_long() {
        let hasher = NameHasher::new(8);
        assert!(hasher.hash(b"12345678").is_ok());
        let err = hasher.hash(b"123456789").unwrap_err();
        assert!(matches!(err, Error::NameTooLong { len: 9, max: 8 }));

        let long = vec![b'x'; DEFAULT_MAX_NAME_LEN + 1];
        assert!(hash_name(&long).is_err());
    }
}
