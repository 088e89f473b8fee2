//! Mapping exchange between servers.
//!
//! Servers piggyback their mapping on replies so that clients and peers with
//! a stale copy can merge it. This module only defines the encodings; the
//! transport carrying them lives outside the crate.

pub mod codec;

pub use codec::{decode_mapping, encode_mapping, frame_mapping, unframe_mapping};
