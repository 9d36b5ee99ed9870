//! Streaming ingest
//!
//! Single pass over the source: hash, compress-or-pass-through, verify.

use std::io::{ErrorKind, Read};

use md5::{Digest, Md5};

use crate::error::{Result, StoreError};
use crate::index::{ContentHash, EntryInfo};

use super::{compress_chunk, StreamInfo, CHUNK_SIZE, MIN_COMPRESSIBLE_LEN};

/// Output of the ingest pipeline, ready to be buffered
#[derive(Debug, Clone)]
pub struct Ingested {
    /// Bytes to append to the data file
    pub payload: Vec<u8>,

    /// Compressed size of each chunk (empty when passed through)
    pub chunk_lengths: Vec<u64>,

    /// Metadata for the index entry (hash always set)
    pub info: EntryInfo,

    /// Number of original bytes read from the source
    pub original_len: u64,
}

/// Streaming state for one ingest
struct Absorber {
    hasher: Md5,
    compress: bool,
    payload: Vec<u8>,
    chunk_lengths: Vec<u64>,
    total: u64,
}

impl Absorber {
    fn absorb(&mut self, chunk: &[u8]) -> Result<()> {
        self.hasher.update(chunk);
        self.total += chunk.len() as u64;

        if self.compress {
            let compressed = compress_chunk(chunk)?;
            self.chunk_lengths.push(compressed.len() as u64);
            self.payload.extend_from_slice(&compressed);
        } else {
            self.payload.extend_from_slice(chunk);
        }
        Ok(())
    }
}

/// Run `source` through the pipeline
///
/// The first chunk is `compression_threshold + 1` bytes (or `CHUNK_SIZE`
/// when the threshold is 0). Filling it past the threshold switches on
/// per-chunk deflate for the whole stream unless the caller marked the
/// stream pre-compressed. Remaining input is read in `CHUNK_SIZE` chunks.
pub fn ingest<R: Read>(mut source: R, declared: &StreamInfo, compression_threshold: u64) -> Result<Ingested> {
    let (first_len, threshold) = if compression_threshold == 0 {
        (CHUNK_SIZE as u64, MIN_COMPRESSIBLE_LEN)
    } else {
        (compression_threshold.saturating_add(1), compression_threshold)
    };

    // Phase A: first chunk decides compression. The buffer grows with the
    // bytes actually read, never to `first_len` up front.
    let mut first = Vec::with_capacity(first_len.min(CHUNK_SIZE as u64) as usize);
    let read = source.by_ref().take(first_len).read_to_end(&mut first)?;
    let mut eof = (read as u64) < first_len;

    let mut absorber = Absorber {
        hasher: Md5::new(),
        compress: !declared.is_compressed() && read as u64 > threshold,
        payload: Vec::with_capacity(read),
        chunk_lengths: Vec::new(),
        total: 0,
    };
    absorber.absorb(&first)?;
    drop(first);

    // Phase B: the rest, decision frozen
    if !eof {
        let mut buf = vec![0u8; CHUNK_SIZE];
        while !eof {
            let read = read_full(&mut source, &mut buf)?;
            eof = read < buf.len();
            if read > 0 {
                absorber.absorb(&buf[..read])?;
            }
        }
    }

    let Absorber {
        hasher,
        compress,
        payload,
        chunk_lengths,
        total,
    } = absorber;

    if total == 0 {
        return Err(StoreError::InvalidArgument("data stream is empty".to_string()));
    }

    if let Some(expected) = declared.length() {
        if expected != total {
            return Err(StoreError::LengthMismatch {
                expected,
                actual: total,
            });
        }
    }

    let hash = ContentHash(hasher.finalize().into());
    if let Some(expected) = declared.hash() {
        if expected != hash {
            return Err(StoreError::HashMismatch {
                expected: expected.to_hex(),
                actual: hash.to_hex(),
            });
        }
    }

    Ok(Ingested {
        payload,
        chunk_lengths,
        info: EntryInfo {
            hash,
            original_length: declared.length(),
            is_compressed: declared.is_compressed(),
            is_chunk_compressed: compress,
        },
        original_len: total,
    })
}

/// Fill `buf` from `source`, stopping early only at end of stream
///
/// Returns the number of bytes read. Network-style sources that hand back
/// short reads still produce full chunks.
pub fn read_full<R: Read>(source: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
