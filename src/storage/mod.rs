//! Storage Module
//!
//! The data file and the crash-safety protocol around it.
//!
//! ## Responsibilities
//! - Append batched payloads to a flat blob
//! - Snapshot the blob before every append, restore it on failure
//! - Recover a snapshot left behind by an interrupted run
//! - Serve payload byte ranges by offset/length
//!
//! ## File Format
//! ```text
//! ┌──────────────┬──────────────┬──────────────┬─────┐
//! │  Payload A   │  Payload B   │  Payload C   │ ... │
//! └──────────────┴──────────────┴──────────────┴─────┘
//!  ^offset A      ^offset B      ^offset C
//! ```
//! No header, no framing: payloads are located only through the index.

pub mod backup;
mod data_file;

pub use backup::{guarded, recover_interrupted, staging_path, Backup};
pub use data_file::DataFile;
