//! Cache Module
//!
//! Read-through cache of raw stored bytes, keyed by logical key.
//!
//! Values are reference-counted `Bytes`: a reader keeps its payload alive
//! even if the entry is evicted mid-read, and a miss always falls back to
//! the data file.

use std::time::Duration;

use bytes::Bytes;
use moka::sync::Cache;

/// Size-bounded cache of raw payloads
pub struct BlobCache {
    inner: Cache<String, Bytes>,
}

impl BlobCache {
    /// Create a cache holding at most `capacity` bytes
    pub fn new(capacity: u64, time_to_idle: Option<Duration>) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(capacity)
            .weigher(|_key: &String, raw: &Bytes| -> u32 {
                u32::try_from(raw.len()).unwrap_or(u32::MAX)
            });

        if let Some(tti) = time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        Self {
            inner: builder.build(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.inner.get(key)
    }

    pub fn insert(&self, key: &str, raw: Bytes) {
        self.inner.insert(key.to_string(), raw);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks();
    }

    /// Approximate number of cached entries
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }

    /// Approximate number of cached bytes
    pub fn weighted_size(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.weighted_size()
    }
}
