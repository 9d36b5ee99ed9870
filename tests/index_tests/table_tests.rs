//! Tests for IndexTable

use binstore::index::{ContentHash, EntryInfo, IndexEntry, IndexTable, Reference};
use binstore::StoreError;

// =============================================================================
// Helper Functions
// =============================================================================

fn make_entry(offset: u64, length: u64, hash_byte: u8) -> IndexEntry {
    IndexEntry {
        reference: Reference {
            offset,
            length,
            chunk_lengths: Vec::new(),
        },
        info: EntryInfo {
            hash: ContentHash([hash_byte; 16]),
            original_length: None,
            is_compressed: false,
            is_chunk_compressed: false,
        },
    }
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_table_insert_get() {
    let mut table = IndexTable::new();
    table.insert("key".to_string(), make_entry(0, 10, 1)).unwrap();

    assert_eq!(table.len(), 1);
    assert!(table.contains_key("key"));
    assert_eq!(table.get("key").unwrap().reference.length, 10);
    assert!(table.get("other").is_none());
}

#[test]
fn test_table_rejects_duplicate_key() {
    let mut table = IndexTable::new();
    table.insert("key".to_string(), make_entry(0, 10, 1)).unwrap();

    let result = table.insert("key".to_string(), make_entry(10, 20, 2));

    assert!(matches!(result, Err(StoreError::KeyAlreadyExists(k)) if k == "key"));
    assert_eq!(table.get("key").unwrap().reference.offset, 0);
}

#[test]
fn test_table_keys_are_ordered() {
    let mut table = IndexTable::new();
    for key in ["zeta", "alpha", "mid"] {
        table.insert(key.to_string(), make_entry(0, 1, 1)).unwrap();
    }

    let keys: Vec<&String> = table.keys().collect();
    assert_eq!(keys, ["alpha", "mid", "zeta"]);
}

// =============================================================================
// Hash Lookup Tests
// =============================================================================

#[test]
fn test_table_find_by_hash() {
    let mut table = IndexTable::new();
    table.insert("a".to_string(), make_entry(0, 10, 1)).unwrap();
    table.insert("b".to_string(), make_entry(10, 5, 2)).unwrap();
    table.insert("c".to_string(), make_entry(0, 10, 1)).unwrap();

    assert_eq!(table.find_by_hash(&ContentHash([2; 16])).unwrap().reference.offset, 10);
    assert!(table.find_by_hash(&ContentHash([3; 16])).is_none());
    assert_eq!(table.unique_payloads(), 2);
}

#[test]
fn test_table_remove_repoints_hash_lookup() {
    let mut table = IndexTable::new();
    table.insert("first".to_string(), make_entry(0, 10, 7)).unwrap();
    table.insert("second".to_string(), make_entry(0, 10, 7)).unwrap();

    table.remove("first").unwrap();

    let hash = ContentHash([7; 16]);
    assert!(table.find_by_hash(&hash).is_some());
    assert_eq!(table.unique_payloads(), 1);

    table.remove("second").unwrap();
    assert!(table.find_by_hash(&hash).is_none());
    assert_eq!(table.unique_payloads(), 0);
    assert!(table.remove("second").is_none());
}

// =============================================================================
// Size Accounting Tests
// =============================================================================

#[test]
fn test_table_encoded_len_matches_bincode() {
    let mut table = IndexTable::new();
    assert_eq!(
        table.encoded_len(),
        bincode::serialize(table.entries()).unwrap().len() as u64
    );

    for i in 0..10u8 {
        table
            .insert(format!("path/to/file{}", i), make_entry(i as u64 * 100, 100, i))
            .unwrap();
    }
    assert_eq!(
        table.encoded_len(),
        bincode::serialize(table.entries()).unwrap().len() as u64
    );

    table.remove("path/to/file3").unwrap();
    assert_eq!(
        table.encoded_len(),
        bincode::serialize(table.entries()).unwrap().len() as u64
    );
}

#[test]
fn test_table_encoded_entry_len() {
    // 8-byte length prefix + 1-byte key, 24-byte reference, 19-byte info
    let len = IndexTable::encoded_entry_len("a", &make_entry(0, 32, 1)).unwrap();
    assert_eq!(len, 52);
}

#[test]
fn test_table_max_end() {
    let mut table = IndexTable::new();
    assert_eq!(table.max_end(), None);

    table.insert("a".to_string(), make_entry(0, 100, 1)).unwrap();
    table.insert("b".to_string(), make_entry(100, 50, 2)).unwrap();
    table.insert("c".to_string(), make_entry(0, 100, 1)).unwrap();

    assert_eq!(table.max_end(), Some(150));
}
