//! Configuration for binstore
//!
//! Centralized configuration with sensible defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default pending-index size that triggers an index flush (1 MiB)
pub const DEFAULT_INDEX_FLUSH_THRESHOLD: u64 = 1024 * 1024;

/// Default pending-data size that triggers a storage flush (1 MiB)
pub const DEFAULT_STORAGE_FLUSH_THRESHOLD: u64 = 1024 * 1024;

/// Default read-cache ceiling (1024 MB)
pub const DEFAULT_CACHE_CAPACITY: u64 = 1024 * 1024 * 1024;

/// Configuration for one storage engine instance
///
/// Immutable once the engine is open; build a new value to change anything.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Folder holding all store files
    /// Internal structure:
    ///   {working_folder}/
    ///     ├── index.bin        (compressed index table)
    ///     ├── storage.bin      (append-only payload blob)
    ///     └── storage.bin.bak  (only while an append is in flight)
    pub working_folder: PathBuf,

    /// Payloads longer than this are chunk-compressed (0 = compress anything
    /// above a minimal size)
    pub compression_threshold: u64,

    /// Ceiling for the index table's bincode-encoded size in bytes, measured
    /// before deflate (0 = unbounded). `index.bin` on disk is that body
    /// compressed plus a 10-byte header, so it is usually much smaller.
    pub max_index_file: u64,

    /// Ceiling for the data file size in bytes (0 = unbounded)
    pub max_storage_file: u64,

    // -------------------------------------------------------------------------
    // Flush Configuration
    // -------------------------------------------------------------------------
    /// Encoded pending-index size that triggers an index flush
    pub index_flush_threshold: u64,

    /// Pending payload bytes that trigger a storage flush
    pub storage_flush_threshold: u64,

    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    /// Total bytes the read cache may hold
    pub cache_capacity: u64,

    /// Evict cache entries not read for this long (None = size-based only)
    pub cache_time_to_idle: Option<Duration>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            working_folder: PathBuf::from("./binstore_data"),
            compression_threshold: 0,
            max_index_file: 0,
            max_storage_file: 0,
            index_flush_threshold: DEFAULT_INDEX_FLUSH_THRESHOLD,
            storage_flush_threshold: DEFAULT_STORAGE_FLUSH_THRESHOLD,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_time_to_idle: None,
        }
    }
}

impl StorageConfig {
    /// Create a new config builder
    pub fn builder() -> StorageConfigBuilder {
        StorageConfigBuilder::default()
    }

    /// Default config rooted at `path`
    pub fn for_folder(path: impl AsRef<Path>) -> Self {
        Self::builder().working_folder(path.as_ref()).build()
    }
}

/// Builder for StorageConfig
#[derive(Default)]
pub struct StorageConfigBuilder {
    config: StorageConfig,
}

impl StorageConfigBuilder {
    /// Set the working folder (root for all store files)
    pub fn working_folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.working_folder = path.into();
        self
    }

    /// Set the compression threshold (in bytes)
    pub fn compression_threshold(mut self, bytes: u64) -> Self {
        self.config.compression_threshold = bytes;
        self
    }

    /// Set the maximum index table size before deflate (in bytes, 0 = unbounded)
    pub fn max_index_file(mut self, bytes: u64) -> Self {
        self.config.max_index_file = bytes;
        self
    }

    /// Set the maximum data file size (in bytes, 0 = unbounded)
    pub fn max_storage_file(mut self, bytes: u64) -> Self {
        self.config.max_storage_file = bytes;
        self
    }

    /// Set the pending-index flush threshold (in bytes)
    pub fn index_flush_threshold(mut self, bytes: u64) -> Self {
        self.config.index_flush_threshold = bytes;
        self
    }

    /// Set the pending-data flush threshold (in bytes)
    pub fn storage_flush_threshold(mut self, bytes: u64) -> Self {
        self.config.storage_flush_threshold = bytes;
        self
    }

    /// Set the cache ceiling (in bytes)
    pub fn cache_capacity(mut self, bytes: u64) -> Self {
        self.config.cache_capacity = bytes;
        self
    }

    /// Evict cache entries idle for longer than `ttl`
    pub fn cache_time_to_idle(mut self, ttl: Duration) -> Self {
        self.config.cache_time_to_idle = Some(ttl);
        self
    }

    pub fn build(self) -> StorageConfig {
        self.config
    }
}
