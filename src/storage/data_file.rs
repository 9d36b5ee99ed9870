//! Data file
//!
//! The flat, append-only payload blob (`storage.bin`).

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{Result, StoreError};

use super::backup;

/// Handle on the data file and its backup path
///
/// Holds no open file: appends and reads open their own handles so reads
/// from many threads never contend on a shared file position.
#[derive(Debug, Clone)]
pub struct DataFile {
    path: PathBuf,
    backup_path: PathBuf,
}

impl DataFile {
    pub fn new(path: impl Into<PathBuf>, backup_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_path: backup_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Create (or truncate to) an empty data file
    pub fn create_empty(&self) -> Result<()> {
        let file = File::create(&self.path)?;
        file.sync_all()?;
        Ok(())
    }

    /// Current length on disk
    pub fn len(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    /// Append `payloads` at `end`, the last known-good length
    ///
    /// Anything past `end` (an orphaned tail from an earlier failed
    /// rollback) is cut first so offsets handed out by the engine hold.
    /// Returns the number of bytes appended.
    pub fn append(&self, end: u64, payloads: &[Vec<u8>]) -> Result<u64> {
        self.append_with(end, |file| {
            let mut writer = BufWriter::new(file);
            let mut written = 0u64;
            for payload in payloads {
                writer.write_all(payload)?;
                written += payload.len() as u64;
            }
            writer.flush()?;
            Ok(written)
        })
    }

    /// Append through a caller-supplied writer, under a backup
    ///
    /// `write` receives the file positioned at `end` and returns how many
    /// bytes it wrote. On any error the file is restored to its state
    /// before the call.
    pub fn append_with<F>(&self, end: u64, write: F) -> Result<u64>
    where
        F: FnOnce(&mut File) -> Result<u64>,
    {
        backup::guarded(&self.path, &self.backup_path, || {
            let mut file = OpenOptions::new().write(true).open(&self.path)?;
            file.set_len(end)?;
            file.seek(SeekFrom::Start(end))?;
            let written = write(&mut file)?;
            file.sync_all()?;
            Ok(written)
        })
    }

    /// Cut the file back to `len` bytes
    pub fn truncate(&self, len: u64) -> Result<()> {
        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_len(len)?;
        file.sync_all()?;
        Ok(())
    }

    /// Read `length` bytes starting at `offset`
    pub fn read_range(&self, offset: u64, length: u64) -> Result<Bytes> {
        let length = usize::try_from(length).map_err(|_| {
            StoreError::InvalidArgument(format!("Payload too large to read: {} bytes", length))
        })?;

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut data = vec![0u8; length];
        file.read_exact(&mut data)?;
        Ok(Bytes::from(data))
    }

    /// Delete a leftover backup, if any
    pub fn discard_backup(&self) -> Result<bool> {
        if !self.backup_path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.backup_path)?;
        Ok(true)
    }
}
