//! Chunk codec
//!
//! Independent deflate chunks, so a payload decodes one chunk at a time.

use std::io::{self, Cursor, Read, Write};

use bytes::Bytes;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::index::IndexEntry;

/// Deflate a single chunk
pub fn compress_chunk(chunk: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(chunk.len() / 2), Compression::default());
    encoder.write_all(chunk)?;
    encoder.finish()
}

/// Inflate a single chunk, appending to `out`
pub fn decompress_chunk(chunk: &[u8], out: &mut Vec<u8>) -> io::Result<usize> {
    DeflateDecoder::new(chunk).read_to_end(out)
}

/// Reader over a stored payload
///
/// Plain payloads are served straight from the raw bytes. Chunk-compressed
/// payloads are inflated lazily, one chunk per refill.
pub struct BlobReader {
    inner: Inner,
}

enum Inner {
    Plain(Cursor<Bytes>),
    Chunked(ChunkedState),
}

struct ChunkedState {
    raw: Bytes,
    chunk_lengths: Vec<u64>,
    next_chunk: usize,
    next_offset: usize,
    decoded: Vec<u8>,
    decoded_pos: usize,
}

impl ChunkedState {
    /// Inflate the next chunk; false once all chunks are consumed
    fn refill(&mut self) -> io::Result<bool> {
        let Some(&len) = self.chunk_lengths.get(self.next_chunk) else {
            return Ok(false);
        };

        let end = self.next_offset + len as usize;
        self.decoded.clear();
        self.decoded_pos = 0;
        decompress_chunk(&self.raw[self.next_offset..end], &mut self.decoded)?;

        self.next_offset = end;
        self.next_chunk += 1;
        Ok(true)
    }
}

impl BlobReader {
    /// Serve `raw` unchanged
    pub fn plain(raw: Bytes) -> Self {
        Self {
            inner: Inner::Plain(Cursor::new(raw)),
        }
    }

    /// Inflate `raw` as consecutive chunks of the given compressed lengths
    pub fn chunked(raw: Bytes, chunk_lengths: Vec<u64>) -> io::Result<Self> {
        let total: u64 = chunk_lengths.iter().sum();
        if total != raw.len() as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Chunk lengths cover {} bytes but payload has {}",
                    total,
                    raw.len()
                ),
            ));
        }

        Ok(Self {
            inner: Inner::Chunked(ChunkedState {
                raw,
                chunk_lengths,
                next_chunk: 0,
                next_offset: 0,
                decoded: Vec::new(),
                decoded_pos: 0,
            }),
        })
    }

    /// Reader matching the layout recorded in `entry`
    pub fn for_entry(raw: Bytes, entry: &IndexEntry) -> io::Result<Self> {
        if entry.info.is_chunk_compressed {
            Self::chunked(raw, entry.reference.chunk_lengths.clone())
        } else {
            Ok(Self::plain(raw))
        }
    }

    /// Drain the reader into a vector
    pub fn into_vec(mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl Read for BlobReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::Plain(cursor) => cursor.read(buf),
            Inner::Chunked(state) => {
                while state.decoded_pos == state.decoded.len() {
                    if !state.refill()? {
                        return Ok(0);
                    }
                }

                let available = &state.decoded[state.decoded_pos..];
                let n = available.len().min(buf.len());
                buf[..n].copy_from_slice(&available[..n]);
                state.decoded_pos += n;
                Ok(n)
            }
        }
    }
}
