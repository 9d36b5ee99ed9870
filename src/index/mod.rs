//! Index Module
//!
//! Maps logical keys to payload locations in the data file.
//!
//! ## Responsibilities
//! - Hold one immutable entry per key (location + content metadata)
//! - Find existing payloads by content hash (dedup)
//! - Track the encoded table size for flush and capacity decisions
//! - Persist the table as a compressed, checksummed file

pub mod codec;
mod entry;
mod table;

pub use codec::{decode_table, encode_table, load_index, save_index};
pub use entry::{ContentHash, EntryInfo, IndexEntry, Reference, HASH_LEN};
pub use table::IndexTable;
