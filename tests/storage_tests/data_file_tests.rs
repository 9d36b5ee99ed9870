//! Tests for DataFile and the backup guard
//!
//! These tests verify:
//! - Appends land at the requested end and report their size
//! - A failed append leaves the file exactly as it was
//! - Leftover backups are restored on recovery
//! - Range reads and truncation

use std::fs;
use std::io::Write;

use binstore::storage::{self, Backup, DataFile};
use binstore::StoreError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_data_file() -> (TempDir, DataFile) {
    let temp_dir = TempDir::new().unwrap();
    let data_file = DataFile::new(
        temp_dir.path().join("storage.bin"),
        temp_dir.path().join("storage.bin.bak"),
    );
    data_file.create_empty().unwrap();
    (temp_dir, data_file)
}

// =============================================================================
// Append Tests
// =============================================================================

#[test]
fn test_data_file_append_and_read() {
    let (_temp, data_file) = setup_temp_data_file();

    let written = data_file
        .append(0, &[b"hello".to_vec(), b" ".to_vec(), b"world".to_vec()])
        .unwrap();

    assert_eq!(written, 11);
    assert_eq!(data_file.len().unwrap(), 11);
    assert_eq!(&data_file.read_range(6, 5).unwrap()[..], b"world");
    assert!(!data_file.backup_path().exists());
}

#[test]
fn test_data_file_append_cuts_orphaned_tail() {
    let (_temp, data_file) = setup_temp_data_file();
    data_file.append(0, &[b"committed".to_vec()]).unwrap();

    // Bytes past the known-good end, e.g. from a rollback whose truncate failed
    let mut file = fs::OpenOptions::new()
        .append(true)
        .open(data_file.path())
        .unwrap();
    file.write_all(b"orphan").unwrap();
    drop(file);

    data_file.append(9, &[b"next".to_vec()]).unwrap();

    assert_eq!(fs::read(data_file.path()).unwrap(), b"committednext".to_vec());
}

#[test]
fn test_data_file_failed_append_restores() {
    let (_temp, data_file) = setup_temp_data_file();
    data_file.append(0, &[b"original".to_vec()]).unwrap();

    let result = data_file.append_with(8, |file| {
        file.write_all(b"partial garbage")?;
        Err(StoreError::InvalidArgument("simulated failure".to_string()))
    });

    assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    assert_eq!(fs::read(data_file.path()).unwrap(), b"original".to_vec());
    assert!(!data_file.backup_path().exists());
}

#[test]
fn test_data_file_truncate() {
    let (_temp, data_file) = setup_temp_data_file();
    data_file.append(0, &[vec![1u8; 100]]).unwrap();

    data_file.truncate(40).unwrap();

    assert_eq!(data_file.len().unwrap(), 40);
}

#[test]
fn test_data_file_read_past_end_fails() {
    let (_temp, data_file) = setup_temp_data_file();
    data_file.append(0, &[vec![1u8; 10]]).unwrap();

    assert!(matches!(data_file.read_range(5, 10), Err(StoreError::Io(_))));
}

// =============================================================================
// Backup Tests
// =============================================================================

#[test]
fn test_guarded_commits_on_success() {
    let (_temp, data_file) = setup_temp_data_file();
    fs::write(data_file.path(), b"before").unwrap();

    let value = storage::guarded(data_file.path(), data_file.backup_path(), || {
        fs::write(data_file.path(), b"after")?;
        Ok(42)
    })
    .unwrap();

    assert_eq!(value, 42);
    assert_eq!(fs::read(data_file.path()).unwrap(), b"after".to_vec());
    assert!(!data_file.backup_path().exists());
}

#[test]
fn test_guarded_fails_before_mutation_without_backup() {
    let (_temp, data_file) = setup_temp_data_file();
    fs::create_dir(data_file.backup_path()).unwrap();

    let mut ran = false;
    let result = storage::guarded(data_file.path(), data_file.backup_path(), || {
        ran = true;
        Ok(())
    });

    assert!(result.is_err());
    assert!(!ran);
}

#[test]
fn test_backup_snapshot_restore() {
    let (_temp, data_file) = setup_temp_data_file();
    fs::write(data_file.path(), b"snapshot me").unwrap();

    let backup = Backup::snapshot(data_file.path(), data_file.backup_path()).unwrap();
    fs::write(data_file.path(), b"clobbered").unwrap();
    backup.restore().unwrap();

    assert_eq!(fs::read(data_file.path()).unwrap(), b"snapshot me".to_vec());
    assert!(!data_file.backup_path().exists());
}

#[test]
fn test_backup_snapshot_leaves_no_staging_file() {
    let (_temp, data_file) = setup_temp_data_file();
    fs::write(data_file.path(), b"contents").unwrap();

    let backup = Backup::snapshot(data_file.path(), data_file.backup_path()).unwrap();

    assert_eq!(fs::read(data_file.backup_path()).unwrap(), b"contents".to_vec());
    assert!(!storage::staging_path(data_file.backup_path()).exists());
    backup.commit().unwrap();
    assert!(!data_file.backup_path().exists());
}

#[test]
fn test_failed_snapshot_cleans_staging_file() {
    let (_temp, data_file) = setup_temp_data_file();
    fs::create_dir(data_file.backup_path()).unwrap();

    let result = Backup::snapshot(data_file.path(), data_file.backup_path());

    assert!(result.is_err());
    assert!(!storage::staging_path(data_file.backup_path()).exists());
}

#[test]
fn test_recover_discards_torn_snapshot() {
    let (_temp, data_file) = setup_temp_data_file();
    fs::write(data_file.path(), b"committed bytes").unwrap();
    let staging = storage::staging_path(data_file.backup_path());
    fs::write(&staging, b"commi").unwrap();

    let recovered = storage::recover_interrupted(data_file.path(), data_file.backup_path()).unwrap();

    assert!(!recovered);
    assert!(!staging.exists());
    assert_eq!(fs::read(data_file.path()).unwrap(), b"committed bytes".to_vec());
}

#[test]
fn test_recover_interrupted() {
    let (_temp, data_file) = setup_temp_data_file();
    fs::write(data_file.path(), b"torn write").unwrap();
    fs::write(data_file.backup_path(), b"good").unwrap();

    let recovered = storage::recover_interrupted(data_file.path(), data_file.backup_path()).unwrap();

    assert!(recovered);
    assert_eq!(fs::read(data_file.path()).unwrap(), b"good".to_vec());
    assert!(!data_file.backup_path().exists());

    let recovered = storage::recover_interrupted(data_file.path(), data_file.backup_path()).unwrap();
    assert!(!recovered);
}

#[test]
fn test_discard_backup() {
    let (_temp, data_file) = setup_temp_data_file();
    assert!(!data_file.discard_backup().unwrap());

    fs::write(data_file.backup_path(), b"stale").unwrap();
    assert!(data_file.discard_backup().unwrap());
    assert!(!data_file.backup_path().exists());
}
