//! Index file codec
//!
//! Encodes the durable table into `index.bin` and back.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Header (10 bytes)                                        │
//! │   Magic: "BSIX" (4) | Version: u16 (2) | BodyCRC: u32 (4)│
//! ├──────────────────────────────────────────────────────────┤
//! │ Body (variable)                                          │
//! │   deflate( bincode( BTreeMap<String, IndexEntry> ) )     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The file is always replaced whole: written to a temp path, synced,
//! then renamed over the live index.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::error::{Result, StoreError};

use super::{IndexEntry, IndexTable};

/// Magic bytes identifying a binstore index file
pub const MAGIC: &[u8; 4] = b"BSIX";

/// Current index format version
pub const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + BodyCRC (4) = 10 bytes
pub const HEADER_SIZE: usize = 10;

/// Encode a table into the complete index file contents
pub fn encode_table(table: &IndexTable) -> Result<Vec<u8>> {
    let encoded = bincode::serialize(table.entries())
        .map_err(|e| StoreError::Serialization(format!("Failed to encode index: {}", e)))?;

    let mut encoder = DeflateEncoder::new(Vec::with_capacity(encoded.len() / 2), Compression::default());
    encoder.write_all(&encoded)?;
    let body = encoder.finish()?;

    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode complete index file contents into a table
pub fn decode_table(bytes: &[u8]) -> Result<IndexTable> {
    if bytes.len() < HEADER_SIZE {
        return Err(StoreError::CorruptIndex(format!(
            "Index file too short: {} bytes",
            bytes.len()
        )));
    }

    let (header, body) = bytes.split_at(HEADER_SIZE);

    if &header[0..4] != MAGIC {
        return Err(StoreError::CorruptIndex(format!(
            "Invalid index magic: expected BSIX, got {:?}",
            &header[0..4]
        )));
    }

    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != VERSION {
        return Err(StoreError::CorruptIndex(format!(
            "Unsupported index version: {}",
            version
        )));
    }

    let stored_crc = u32::from_le_bytes([header[6], header[7], header[8], header[9]]);
    let actual_crc = crc32fast::hash(body);
    if stored_crc != actual_crc {
        return Err(StoreError::CorruptIndex(format!(
            "Index checksum mismatch: stored {:08x}, computed {:08x}",
            stored_crc, actual_crc
        )));
    }

    let mut encoded = Vec::new();
    DeflateDecoder::new(body)
        .read_to_end(&mut encoded)
        .map_err(|e| StoreError::CorruptIndex(format!("Failed to inflate index: {}", e)))?;

    let entries: BTreeMap<String, IndexEntry> = bincode::deserialize(&encoded)
        .map_err(|e| StoreError::CorruptIndex(format!("Failed to decode index: {}", e)))?;

    IndexTable::from_entries(entries)
        .map_err(|e| StoreError::CorruptIndex(format!("Failed to rebuild index: {}", e)))
}

/// Persist `table` to `path`, staging through `tmp_path`
pub fn save_index(table: &IndexTable, path: &Path, tmp_path: &Path) -> Result<()> {
    let bytes = encode_table(table)?;

    let mut file = File::create(tmp_path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(tmp_path, path)?;
    Ok(())
}

/// Load a table from `path`
pub fn load_index(path: &Path) -> Result<IndexTable> {
    let bytes = fs::read(path)?;
    decode_table(&bytes)
}
