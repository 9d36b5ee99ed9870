//! Backup guard
//!
//! Snapshot → mutate → discard snapshot, or restore it on failure.
//!
//! A snapshot is copied to a staging path and renamed into place only once
//! synced, so a backup file that exists is always complete.

use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// A snapshot of a file taken before mutating it
#[derive(Debug)]
pub struct Backup {
    original: PathBuf,
    backup: PathBuf,
}

impl Backup {
    /// Copy `original` to `backup`
    pub fn snapshot(original: &Path, backup: &Path) -> Result<Self> {
        let staging = staging_path(backup);
        if let Err(e) = copy_synced(original, &staging).and_then(|()| fs::rename(&staging, backup)) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }
        Ok(Self {
            original: original.to_path_buf(),
            backup: backup.to_path_buf(),
        })
    }

    /// The mutation succeeded; delete the snapshot
    pub fn commit(self) -> Result<()> {
        fs::remove_file(&self.backup)?;
        Ok(())
    }

    /// The mutation failed; put the snapshot back in place
    pub fn restore(self) -> Result<()> {
        fs::rename(&self.backup, &self.original)?;
        Ok(())
    }
}

/// Where a snapshot is written before it is renamed to `backup`
pub fn staging_path(backup: &Path) -> PathBuf {
    let mut name = OsString::from(backup.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn copy_synced(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::copy(from, to)?;
    File::open(to)?.sync_all()
}

/// Run `op` against `original` with a backup held at `backup`
///
/// On error the original is restored and the error from `op` is returned.
/// If the restore itself fails, that error wins: the file is in an unknown
/// state and the leftover backup is picked up by the next open.
pub fn guarded<T>(original: &Path, backup: &Path, op: impl FnOnce() -> Result<T>) -> Result<T> {
    let snapshot = Backup::snapshot(original, backup)?;

    match op() {
        Ok(value) => {
            snapshot.commit()?;
            Ok(value)
        }
        Err(e) => {
            tracing::warn!("Mutation of {} failed, restoring backup: {}", original.display(), e);
            if let Err(restore_err) = snapshot.restore() {
                tracing::error!(
                    "Failed to restore {} from backup: {}",
                    original.display(),
                    restore_err
                );
                return Err(restore_err);
            }
            Err(e)
        }
    }
}

/// Restore `original` from a backup left by an interrupted run
///
/// A half-copied snapshot never reached its final name; it is deleted and
/// `original`, which the copy never touched, is kept. Returns true if a
/// backup was found and restored.
pub fn recover_interrupted(original: &Path, backup: &Path) -> Result<bool> {
    let staging = staging_path(backup);
    if staging.exists() {
        tracing::warn!("Removing incomplete backup {}", staging.display());
        fs::remove_file(&staging)?;
    }

    if !backup.exists() {
        return Ok(false);
    }

    tracing::warn!(
        "Found leftover backup {}, restoring {}",
        backup.display(),
        original.display()
    );
    fs::rename(backup, original)?;
    Ok(true)
}
