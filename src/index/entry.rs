//! Index entry definitions
//!
//! Defines the per-key record stored in the index table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Length of a content digest in bytes (MD5)
pub const HASH_LEN: usize = 16;

/// Digest of a payload's original (uncompressed) bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; HASH_LEN]);

impl ContentHash {
    /// Lowercase hex rendering, as printed by `md5sum`
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; HASH_LEN]> for ContentHash {
    fn from(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Location of a payload inside the data file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Byte offset within the data file
    pub offset: u64,

    /// Bytes occupied in the data file
    pub length: u64,

    /// Compressed size of every chunk (empty unless chunk-compressed)
    pub chunk_lengths: Vec<u64>,
}

impl Reference {
    /// First byte past the end of this payload
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Metadata describing a stored payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub hash: ContentHash,

    /// Length declared by the caller, if any
    pub original_length: Option<u64>,

    /// Caller marked the stream as already compressed
    pub is_compressed: bool,

    /// The engine deflated the payload chunk by chunk
    pub is_chunk_compressed: bool,
}

/// A single entry in the index table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub reference: Reference,
    pub info: EntryInfo,
}
