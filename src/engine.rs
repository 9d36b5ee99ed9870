//! Engine Module
//!
//! The core storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Run adds through the pipeline, dedup, and pending buffer
//! - Flush pending state in batches, with rollback on failure
//! - Serve reads from cache or the data file
//! - Recover interrupted appends on startup

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::buffer::{FlushMode, PendingBuffer};
use crate::cache::BlobCache;
use crate::config::StorageConfig;
use crate::error::{Result, StoreError};
use crate::index::{self, EntryInfo, IndexEntry, IndexTable, Reference};
use crate::pipeline::{self, BlobReader, StreamInfo};
use crate::storage::{self, DataFile};

/// Mutable engine state, guarded by a single lock
struct EngineState {
    /// Index as of the last successful flush
    durable: IndexTable,

    /// Entries and payloads added since
    pending: PendingBuffer,

    /// Length of the data file as of the last successful append
    data_len: u64,

    /// Set once shutdown has completed
    closed: bool,
}

impl EngineState {
    /// Existing entry with the same content, durable first
    fn find_by_hash(&self, hash: &index::ContentHash) -> Option<&IndexEntry> {
        self.durable
            .find_by_hash(hash)
            .or_else(|| self.pending.index().find_by_hash(hash))
    }

    fn has_key(&self, key: &str) -> bool {
        self.durable.contains_key(key) || self.pending.index().contains_key(key)
    }

    /// Where the next new payload will start
    fn logical_end(&self) -> u64 {
        self.data_len + self.pending.data_len()
    }
}

/// Point-in-time statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Durable keys
    pub entries: usize,

    /// Distinct payloads referenced by durable keys
    pub unique_payloads: usize,

    /// Durable data file length
    pub data_file_len: u64,

    /// Keys not yet flushed
    pub pending_entries: usize,

    /// Payload bytes not yet flushed
    pub pending_bytes: u64,
}

/// The main storage engine
///
/// ## Concurrency Model
///
/// - **Adds**: the pipeline (hashing, compression) runs without any lock,
///   so concurrent adds compress in parallel. Duplicate check, dedup,
///   allocation, buffering and flushing then run under `state`.
///
/// - **Reads** (get/contains): take `state` only to force a flush and
///   look up the entry. Cache lookups and data-file reads happen after the
///   lock is released; a durable entry's bytes are always on disk before
///   the entry becomes durable, and the data file is append-only.
pub struct Engine {
    /// Engine configuration
    config: StorageConfig,

    /// Live index file
    index_path: PathBuf,

    /// Staging path for index rewrites
    index_tmp_path: PathBuf,

    /// Append-only payload blob (+ its backup path)
    data_file: DataFile,

    /// Raw payload cache
    cache: BlobCache,

    /// Serializes index/buffer mutation and flushes
    state: Mutex<EngineState>,
}

impl Engine {
    // =========================================================================
    // File Names (derived from working_folder, not configurable)
    // =========================================================================
    pub const INDEX_FILENAME: &'static str = "index.bin";
    pub const INDEX_TMP_FILENAME: &'static str = "index.bin.tmp";
    pub const STORAGE_FILENAME: &'static str = "storage.bin";
    pub const BACKUP_FILENAME: &'static str = "storage.bin.bak";
    pub const BACKUP_STAGING_FILENAME: &'static str = "storage.bin.bak.tmp";

    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Create the working folder
    /// 2. Restore the data file from a leftover backup
    /// 3. Remove a half-written index
    /// 4. Load the index, or initialize an empty store
    pub fn open(config: StorageConfig) -> Result<Self> {
        // Step 1: Create working folder if it doesn't exist
        let folder = &config.working_folder;
        fs::create_dir_all(folder)?;

        let index_path = folder.join(Self::INDEX_FILENAME);
        let index_tmp_path = folder.join(Self::INDEX_TMP_FILENAME);
        let data_file = DataFile::new(
            folder.join(Self::STORAGE_FILENAME),
            folder.join(Self::BACKUP_FILENAME),
        );

        // Step 2: An interrupted append left its snapshot behind (a torn
        // snapshot is discarded instead)
        storage::recover_interrupted(data_file.path(), data_file.backup_path())?;

        // Step 3: An interrupted index rewrite never reached the rename
        if index_tmp_path.exists() {
            tracing::warn!("Removing stale {}", index_tmp_path.display());
            fs::remove_file(&index_tmp_path)?;
        }

        // Step 4: Load or initialize
        let (durable, data_len) = if index_path.is_file() && data_file.exists() {
            let table = index::load_index(&index_path)?;
            let data_len = data_file.len()?;

            if let Some(end) = table.max_end() {
                if end > data_len {
                    return Err(StoreError::CorruptIndex(format!(
                        "Index references byte {} but {} holds only {} bytes",
                        end,
                        Self::STORAGE_FILENAME,
                        data_len
                    )));
                }
            }
            (table, data_len)
        } else {
            if index_path.exists() || data_file.exists() {
                tracing::warn!(
                    "Incomplete store in {}, starting empty",
                    folder.display()
                );
            }
            let table = IndexTable::new();
            data_file.create_empty()?;
            index::save_index(&table, &index_path, &index_tmp_path)?;
            (table, 0)
        };

        tracing::info!(
            entries = durable.len(),
            data_len,
            "Opened store at {}",
            folder.display()
        );

        let cache = BlobCache::new(config.cache_capacity, config.cache_time_to_idle);

        Ok(Self {
            config,
            index_path,
            index_tmp_path,
            data_file,
            cache,
            state: Mutex::new(EngineState {
                durable,
                pending: PendingBuffer::new(),
                data_len,
                closed: false,
            }),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified working folder
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(StorageConfig::for_folder(path))
    }

    /// Add a byte stream under `key`
    ///
    /// Steps:
    /// 1. Stream `data` through the pipeline (no lock held)
    /// 2. Reject duplicate keys
    /// 3. Reuse an existing payload with the same hash, or allocate space
    /// 4. Check index/storage ceilings
    /// 5. Buffer, then flush whatever is full
    ///
    /// A failed add leaves the index and data files as they were.
    pub fn add<R: Read>(&self, key: &str, data: R, info: StreamInfo) -> Result<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidArgument("key is empty".to_string()));
        }

        // Step 1: Hash and compress outside the lock
        let ingested = pipeline::ingest(data, &info, self.config.compression_threshold)?;

        let mut state = self.state.lock();

        // Step 2: Keys are write-once
        if state.has_key(key) {
            return Err(StoreError::KeyAlreadyExists(key.to_string()));
        }

        // Step 3: Dedup or allocate
        let (entry, payload) = match state.find_by_hash(&ingested.info.hash) {
            Some(existing) => {
                tracing::debug!(
                    key,
                    hash = %ingested.info.hash,
                    offset = existing.reference.offset,
                    "Content already stored, sharing payload"
                );
                let entry = IndexEntry {
                    reference: existing.reference.clone(),
                    info: EntryInfo {
                        is_chunk_compressed: existing.info.is_chunk_compressed,
                        ..ingested.info
                    },
                };
                (entry, None)
            }
            None => {
                let entry = IndexEntry {
                    reference: Reference {
                        offset: state.logical_end(),
                        length: ingested.payload.len() as u64,
                        chunk_lengths: ingested.chunk_lengths,
                    },
                    info: ingested.info,
                };
                (entry, Some(ingested.payload))
            }
        };

        // Step 4: Ceilings
        let new_bytes = payload.as_ref().map_or(0, |p| p.len() as u64);
        self.check_capacity(&state, key, &entry, new_bytes)?;

        // Step 5: Buffer and flush if full
        let allocated = payload.is_some();
        state.pending.push_entry(key.to_string(), entry)?;
        if let Some(payload) = payload {
            state.pending.push_payload(payload);
        }

        if let Err(e) = self.flush_locked(&mut state, FlushMode::IfFull) {
            state.pending.undo_add(key, allocated);
            return Err(e);
        }

        Ok(())
    }

    /// Get a reader over the bytes stored under `key`
    ///
    /// Search order:
    /// 1. Flush pending state
    /// 2. Cache (raw bytes)
    /// 3. Data file
    pub fn get(&self, key: &str) -> Result<BlobReader> {
        let entry = self.lookup(key)?;

        let raw = match self.cache.get(key) {
            Some(raw) => raw,
            None => {
                let raw = self
                    .data_file
                    .read_range(entry.reference.offset, entry.reference.length)?;
                self.cache.insert(key, raw.clone());
                raw
            }
        };

        Ok(BlobReader::for_entry(raw, &entry)?)
    }

    /// Get the bytes stored under `key` as a vector
    pub fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        Ok(self.get(key)?.into_vec()?)
    }

    /// Whether `key` is stored
    ///
    /// Flushes pending state first, so an add that returned on another
    /// thread is always visible.
    pub fn contains(&self, key: &str) -> Result<bool> {
        if key.is_empty() {
            return Ok(false);
        }

        let mut state = self.state.lock();
        self.flush_locked(&mut state, FlushMode::Force)?;

        Ok(self.cache.contains(key) || state.durable.contains_key(key))
    }

    /// Flush all pending state to disk (public API)
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.flush_locked(&mut state, FlushMode::Force)
    }

    /// Close the engine gracefully
    ///
    /// Flushes pending state, releases the cache and removes leftover
    /// temp/backup files. Dropping the engine does the same, logging any
    /// error instead of returning it.
    pub fn close(self) -> Result<()> {
        self.shutdown()
    }

    /// Point-in-time statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let state = self.state.lock();
        Ok(StoreStats {
            entries: state.durable.len(),
            unique_payloads: state.durable.unique_payloads(),
            data_file_len: state.data_len,
            pending_entries: state.pending.index().len(),
            pending_bytes: state.pending.data_len(),
        })
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the working folder path
    pub fn working_folder(&self) -> &Path {
        &self.config.working_folder
    }

    /// Get the configuration
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Force a flush and return a copy of the durable entry for `key`
    fn lookup(&self, key: &str) -> Result<IndexEntry> {
        if key.is_empty() {
            return Err(StoreError::InvalidArgument("key is empty".to_string()));
        }

        let mut state = self.state.lock();
        self.flush_locked(&mut state, FlushMode::Force)?;

        state
            .durable
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    /// Reject an add that would push either file past its ceiling
    fn check_capacity(&self, state: &EngineState, key: &str, entry: &IndexEntry, new_bytes: u64) -> Result<()> {
        if self.config.max_index_file > 0 {
            let projected = state.durable.encoded_len()
                + state.pending.index().entries_encoded_len()
                + IndexTable::encoded_entry_len(key, entry)?;
            if projected > self.config.max_index_file {
                return Err(StoreError::CapacityExceeded(format!(
                    "index would grow to {} bytes (max {})",
                    projected, self.config.max_index_file
                )));
            }
        }

        if self.config.max_storage_file > 0 && new_bytes > 0 {
            let projected = state.logical_end() + new_bytes;
            if projected > self.config.max_storage_file {
                return Err(StoreError::CapacityExceeded(format!(
                    "data file would grow to {} bytes (max {})",
                    projected, self.config.max_storage_file
                )));
            }
        }

        Ok(())
    }

    /// Internal flush implementation (called with the state lock held)
    ///
    /// Order: payloads first, then the index, so a durable entry never
    /// points past the end of the data file. On failure the data file is
    /// cut back, the durable table restored, and pending state kept.
    fn flush_locked(&self, state: &mut EngineState, mode: FlushMode) -> Result<()> {
        let plan = state.pending.plan(
            mode,
            self.config.index_flush_threshold,
            self.config.storage_flush_threshold,
        );
        if plan.is_empty() {
            return Ok(());
        }

        let data_len_before = state.data_len;

        // Step 1: Append queued payloads under a backup
        if plan.storage {
            let appended = self
                .data_file
                .append(state.data_len, state.pending.payloads())?;
            state.data_len += appended;
        }

        // Step 2: Merge and persist the index
        if plan.index {
            if let Err(e) = self.commit_index(state) {
                if plan.storage {
                    if let Err(truncate_err) = self.data_file.truncate(data_len_before) {
                        tracing::error!(
                            "Failed to cut {} back to {} bytes: {}",
                            Self::STORAGE_FILENAME,
                            data_len_before,
                            truncate_err
                        );
                    }
                    state.data_len = data_len_before;
                }
                return Err(e);
            }
        }

        // Step 3: Payloads are on disk; entries now reference durable bytes
        if plan.storage {
            state.pending.clear_payloads();
        }

        tracing::debug!(
            storage = plan.storage,
            index = plan.index,
            entries = state.durable.len(),
            data_len = state.data_len,
            "Flushed pending state"
        );
        Ok(())
    }

    /// Move pending entries into the durable table and persist it
    fn commit_index(&self, state: &mut EngineState) -> Result<()> {
        let batch = state.pending.take_index();

        let result = batch
            .iter()
            .try_for_each(|(key, entry)| state.durable.insert(key.clone(), entry.clone()))
            .and_then(|()| index::save_index(&state.durable, &self.index_path, &self.index_tmp_path));

        if let Err(e) = result {
            for key in batch.keys() {
                state.durable.remove(key);
            }
            if let Err(save_err) =
                index::save_index(&state.durable, &self.index_path, &self.index_tmp_path)
            {
                tracing::error!("Failed to re-persist index after rollback: {}", save_err);
            }
            state.pending.restore_index(batch);
            return Err(e);
        }

        Ok(())
    }

    /// Flush, release the cache, remove leftovers
    fn shutdown(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }

        self.flush_locked(&mut state, FlushMode::Force)?;
        self.cache.clear();

        if self.data_file.discard_backup()? {
            tracing::warn!("Removed leftover {}", Self::BACKUP_FILENAME);
        }
        if self.index_tmp_path.exists() {
            fs::remove_file(&self.index_tmp_path)?;
        }

        state.closed = true;
        tracing::info!(
            entries = state.durable.len(),
            data_len = state.data_len,
            "Closed store at {}",
            self.config.working_folder.display()
        );
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!("Engine shutdown failed: {}", e);
        }
    }
}
