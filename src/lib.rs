//! # binstore
//!
//! An embedded, content-addressed binary object store with:
//! - Write-once string keys mapped to arbitrary byte streams
//! - Deduplication by content hash (identical payloads stored once)
//! - Chunked deflate compression above a size threshold
//! - Batched flushes with crash-safe, backed-up appends
//! - A size-bounded read cache
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Engine (add / get / contains)              │
//! │                 (one lock per engine instance)               │
//! └──────┬──────────────────────┬──────────────────────┬────────┘
//!        │ add                  │ flush                │ get
//!        ▼                      ▼                      ▼
//!   ┌──────────┐         ┌─────────────┐         ┌───────────┐
//!   │ Pipeline │────────▶│   Pending   │         │   Cache   │
//!   │hash+zip  │  dedup  │   Buffer    │         │  (moka)   │
//!   └──────────┘         └──────┬──────┘         └─────┬─────┘
//!                               │                      │ miss
//!                 ┌─────────────┴────────────┐         │
//!                 ▼                          ▼         ▼
//!          ┌─────────────┐           ┌──────────────────────┐
//!          │  index.bin  │           │     storage.bin      │
//!          │ (rewritten) │           │ (append + .bak guard)│
//!          └─────────────┘           └──────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod index;
pub mod pipeline;
pub mod buffer;
pub mod cache;
pub mod storage;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{StoreError, Result};
pub use config::StorageConfig;
pub use engine::{Engine, StoreStats};
pub use index::ContentHash;
pub use pipeline::{BlobReader, StreamInfo};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of binstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
