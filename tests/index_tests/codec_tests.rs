//! Tests for the index file codec

use std::fs;

use binstore::index::{self, codec, ContentHash, EntryInfo, IndexEntry, IndexTable, Reference};
use binstore::StoreError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn make_entry(offset: u64, length: u64, hash_byte: u8, chunks: Vec<u64>) -> IndexEntry {
    IndexEntry {
        reference: Reference {
            offset,
            length,
            chunk_lengths: chunks.clone(),
        },
        info: EntryInfo {
            hash: ContentHash([hash_byte; 16]),
            original_length: Some(length * 2),
            is_compressed: false,
            is_chunk_compressed: !chunks.is_empty(),
        },
    }
}

fn sample_table() -> IndexTable {
    let mut table = IndexTable::new();
    table
        .insert("docs/readme.md".to_string(), make_entry(0, 120, 1, vec![]))
        .unwrap();
    table
        .insert("bin/tool.exe".to_string(), make_entry(120, 900, 2, vec![400, 500]))
        .unwrap();
    table
        .insert("docs/copy.md".to_string(), make_entry(0, 120, 1, vec![]))
        .unwrap();
    table
}

// =============================================================================
// Encode/Decode Tests
// =============================================================================

#[test]
fn test_codec_roundtrip_preserves_entries() {
    let table = sample_table();

    let bytes = index::encode_table(&table).unwrap();
    let decoded = index::decode_table(&bytes).unwrap();

    assert_eq!(decoded.entries(), table.entries());
    assert_eq!(decoded.unique_payloads(), 2);
    assert_eq!(decoded.encoded_len(), table.encoded_len());
    assert!(decoded.find_by_hash(&ContentHash([2; 16])).is_some());
}

#[test]
fn test_codec_header_layout() {
    let bytes = index::encode_table(&sample_table()).unwrap();

    assert_eq!(&bytes[0..4], codec::MAGIC);
    assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), codec::VERSION);
    let crc = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
    assert_eq!(crc, crc32fast::hash(&bytes[codec::HEADER_SIZE..]));
}

#[test]
fn test_codec_encoding_is_deterministic() {
    let table = sample_table();
    let mut pairs: Vec<_> = table.iter().collect();
    pairs.reverse();

    let mut reversed = IndexTable::new();
    for (key, entry) in pairs {
        reversed.insert(key.clone(), entry.clone()).unwrap();
    }

    assert_eq!(
        index::encode_table(&table).unwrap(),
        index::encode_table(&reversed).unwrap()
    );
}

#[test]
fn test_codec_empty_table() {
    let bytes = index::encode_table(&IndexTable::new()).unwrap();
    let decoded = index::decode_table(&bytes).unwrap();

    assert!(decoded.is_empty());
    assert_eq!(decoded.max_end(), None);
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_codec_rejects_bad_magic() {
    let mut bytes = index::encode_table(&sample_table()).unwrap();
    bytes[0] = b'X';

    assert!(matches!(index::decode_table(&bytes), Err(StoreError::CorruptIndex(_))));
}

#[test]
fn test_codec_rejects_unknown_version() {
    let mut bytes = index::encode_table(&sample_table()).unwrap();
    bytes[4..6].copy_from_slice(&99u16.to_le_bytes());

    assert!(matches!(index::decode_table(&bytes), Err(StoreError::CorruptIndex(_))));
}

#[test]
fn test_codec_rejects_flipped_body_bit() {
    let mut bytes = index::encode_table(&sample_table()).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;

    assert!(matches!(index::decode_table(&bytes), Err(StoreError::CorruptIndex(_))));
}

#[test]
fn test_codec_rejects_truncated_file() {
    let bytes = index::encode_table(&sample_table()).unwrap();

    assert!(matches!(index::decode_table(&bytes[..6]), Err(StoreError::CorruptIndex(_))));
    assert!(matches!(
        index::decode_table(&bytes[..bytes.len() - 3]),
        Err(StoreError::CorruptIndex(_))
    ));
}

// =============================================================================
// File Tests
// =============================================================================

#[test]
fn test_save_and_load_index() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index.bin");
    let tmp_path = temp_dir.path().join("index.bin.tmp");
    let table = sample_table();

    index::save_index(&table, &path, &tmp_path).unwrap();

    assert!(path.is_file());
    assert!(!tmp_path.exists());
    let loaded = index::load_index(&path).unwrap();
    assert_eq!(loaded.entries(), table.entries());
}

#[test]
fn test_save_index_replaces_whole_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index.bin");
    let tmp_path = temp_dir.path().join("index.bin.tmp");

    index::save_index(&sample_table(), &path, &tmp_path).unwrap();
    index::save_index(&IndexTable::new(), &path, &tmp_path).unwrap();

    assert!(index::load_index(&path).unwrap().is_empty());
    assert_eq!(
        fs::read(&path).unwrap(),
        index::encode_table(&IndexTable::new()).unwrap()
    );
}

#[test]
fn test_failed_save_keeps_previous_index() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index.bin");
    let tmp_path = temp_dir.path().join("index.bin.tmp");
    index::save_index(&sample_table(), &path, &tmp_path).unwrap();
    let before = fs::read(&path).unwrap();

    fs::create_dir(&tmp_path).unwrap();
    let result = index::save_index(&IndexTable::new(), &path, &tmp_path);

    assert!(matches!(result, Err(StoreError::Io(_))));
    assert_eq!(fs::read(&path).unwrap(), before);
}
