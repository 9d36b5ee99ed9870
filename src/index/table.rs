//! Index table implementation
//!
//! BTreeMap-based key → entry table with a secondary hash lookup for dedup.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Result, StoreError};

use super::{ContentHash, IndexEntry};

/// bincode length prefix written in front of a serialized map
const MAP_LEN_PREFIX: u64 = 8;

/// Key → entry mapping
///
/// Keys are write-once: `insert` refuses a key that is already present.
/// The table tracks its own bincode-encoded size so capacity and flush
/// thresholds never need a trial serialization.
#[derive(Debug, Default, Clone)]
pub struct IndexTable {
    /// Ordered so that the encoded form is deterministic
    entries: BTreeMap<String, IndexEntry>,

    /// Content hash → first key stored with that hash
    by_hash: HashMap<ContentHash, String>,

    /// Sum of encoded (key, entry) sizes, excluding the map prefix
    entries_len: u64,
}

impl IndexTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a table (and its hash lookup) from decoded entries
    pub fn from_entries(entries: BTreeMap<String, IndexEntry>) -> Result<Self> {
        let mut table = Self::new();
        for (key, entry) in entries {
            table.insert(key, entry)?;
        }
        Ok(table)
    }

    /// Encoded size of one (key, entry) pair
    pub fn encoded_entry_len(key: &str, entry: &IndexEntry) -> Result<u64> {
        bincode::serialized_size(&(key, entry))
            .map_err(|e| StoreError::Serialization(format!("Failed to size index entry: {}", e)))
    }

    /// Insert a new key
    pub fn insert(&mut self, key: String, entry: IndexEntry) -> Result<()> {
        if self.entries.contains_key(&key) {
            return Err(StoreError::KeyAlreadyExists(key));
        }

        self.entries_len += Self::encoded_entry_len(&key, &entry)?;
        self.by_hash
            .entry(entry.info.hash)
            .or_insert_with(|| key.clone());
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Remove a key (only used to roll back a failed flush)
    pub fn remove(&mut self, key: &str) -> Option<IndexEntry> {
        let entry = self.entries.remove(key)?;

        if let Ok(len) = Self::encoded_entry_len(key, &entry) {
            self.entries_len = self.entries_len.saturating_sub(len);
        }

        // Re-point the hash lookup at another key sharing the content
        if self.by_hash.get(&entry.info.hash).map(String::as_str) == Some(key) {
            self.by_hash.remove(&entry.info.hash);
            if let Some((other, _)) = self
                .entries
                .iter()
                .find(|(_, e)| e.info.hash == entry.info.hash)
            {
                self.by_hash.insert(entry.info.hash, other.clone());
            }
        }

        Some(entry)
    }

    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Any entry whose content hashes to `hash`
    pub fn find_by_hash(&self, hash: &ContentHash) -> Option<&IndexEntry> {
        self.by_hash.get(hash).and_then(|key| self.entries.get(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct payloads referenced by this table
    pub fn unique_payloads(&self) -> usize {
        self.by_hash.len()
    }

    /// Size of the table once bincode-encoded (before compression)
    pub fn encoded_len(&self) -> u64 {
        MAP_LEN_PREFIX + self.entries_len
    }

    /// Encoded size of the entries alone, for merging projections
    pub fn entries_encoded_len(&self) -> u64 {
        self.entries_len
    }

    /// Highest data-file offset referenced by any entry
    pub fn max_end(&self) -> Option<u64> {
        self.entries.values().map(|e| e.reference.end()).max()
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndexEntry)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Borrow the underlying map (for serialization)
    pub fn entries(&self) -> &BTreeMap<String, IndexEntry> {
        &self.entries
    }
}
