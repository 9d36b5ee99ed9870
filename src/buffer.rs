//! Buffer Module
//!
//! Pending writes that have not reached disk yet.
//!
//! ## Responsibilities
//! - Hold index entries added since the last index flush
//! - Queue payload bytes in append order
//! - Decide which flushes are due
//! - Undo the contribution of a single failed add

use std::mem;

use crate::error::Result;
use crate::index::{IndexEntry, IndexTable};

/// How eagerly to flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Commit everything pending (reads, close, explicit flush)
    Force,

    /// Commit only what has crossed its size threshold (after add)
    IfFull,
}

/// Which parts of the pending state a flush commits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushPlan {
    /// Append queued payloads to the data file
    pub storage: bool,

    /// Merge pending entries into the durable table and persist it
    pub index: bool,
}

impl FlushPlan {
    pub fn is_empty(&self) -> bool {
        !self.storage && !self.index
    }
}

/// Pending state carried between flushes
#[derive(Debug, Default)]
pub struct PendingBuffer {
    index: IndexTable,
    payloads: Vec<Vec<u8>>,
    data_len: u64,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> &IndexTable {
        &self.index
    }

    /// Queued payloads in the order they will be appended
    pub fn payloads(&self) -> &[Vec<u8>] {
        &self.payloads
    }

    /// Total bytes of queued payloads
    pub fn data_len(&self) -> u64 {
        self.data_len
    }

    pub fn push_entry(&mut self, key: String, entry: IndexEntry) -> Result<()> {
        self.index.insert(key, entry)
    }

    pub fn push_payload(&mut self, payload: Vec<u8>) {
        self.data_len += payload.len() as u64;
        self.payloads.push(payload);
    }

    /// Decide what a flush in `mode` must commit
    ///
    /// An index flush always drags the storage flush along: an entry may
    /// only become durable once its bytes are.
    pub fn plan(&self, mode: FlushMode, index_threshold: u64, storage_threshold: u64) -> FlushPlan {
        let force = mode == FlushMode::Force;

        let index = !self.index.is_empty()
            && (force || self.index.encoded_len() >= index_threshold);
        let storage = !self.payloads.is_empty()
            && (force || index || self.data_len >= storage_threshold);

        FlushPlan { storage, index }
    }

    /// Forget payloads that are now on disk
    pub fn clear_payloads(&mut self) {
        self.payloads.clear();
        self.data_len = 0;
    }

    /// Hand the pending entries over for merging
    pub fn take_index(&mut self) -> IndexTable {
        mem::take(&mut self.index)
    }

    /// Put back entries whose merge failed
    pub fn restore_index(&mut self, index: IndexTable) {
        self.index = index;
    }

    /// Remove what one add contributed: its entry, and its payload if it
    /// allocated new space (always the most recently queued one)
    pub fn undo_add(&mut self, key: &str, allocated: bool) {
        self.index.remove(key);
        if allocated {
            if let Some(payload) = self.payloads.pop() {
                self.data_len -= payload.len() as u64;
            }
        }
    }
}
