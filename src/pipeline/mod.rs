//! Pipeline Module
//!
//! Turns a caller's byte stream into the bytes that land in the data file.
//!
//! ## Responsibilities
//! - Read the source exactly once, in fixed-size chunks
//! - Hash the original bytes (MD5) for integrity and dedup
//! - Decide from the first chunk whether to deflate every chunk
//! - Verify caller-declared length and hash
//! - Decode stored payloads back chunk by chunk on read

mod chunk;
mod ingest;

pub use chunk::{compress_chunk, decompress_chunk, BlobReader};
pub use ingest::{ingest, read_full, Ingested};

use crate::index::ContentHash;

/// Size of every chunk after the first (16 KiB)
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Smallest payload worth compressing when no threshold is configured
pub const MIN_COMPRESSIBLE_LEN: u64 = 256;

/// Caller-supplied metadata for an add
///
/// An immutable value: the `with_*` methods return a new `StreamInfo`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamInfo {
    length: Option<u64>,
    hash: Option<ContentHash>,
    is_compressed: bool,
}

impl StreamInfo {
    /// No declared length or hash, not pre-compressed
    pub const fn empty() -> Self {
        Self {
            length: None,
            hash: None,
            is_compressed: false,
        }
    }

    /// Declare the exact number of bytes the stream will yield
    pub fn with_length(self, length: u64) -> Self {
        Self {
            length: Some(length),
            ..self
        }
    }

    /// Declare the MD5 of the stream's bytes
    pub fn with_hash(self, hash: impl Into<ContentHash>) -> Self {
        Self {
            hash: Some(hash.into()),
            ..self
        }
    }

    /// Mark the stream as already compressed (stored as-is)
    pub fn compressed(self) -> Self {
        Self {
            is_compressed: true,
            ..self
        }
    }

    pub fn length(&self) -> Option<u64> {
        self.length
    }

    pub fn hash(&self) -> Option<ContentHash> {
        self.hash
    }

    pub fn is_compressed(&self) -> bool {
        self.is_compressed
    }
}
