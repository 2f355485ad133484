//! Tests for the write-ahead log
//!
//! These tests verify:
//! - Frame round-trips for multi-operation entries
//! - CRC32 corruption detection
//! - Writer LSN assignment across reopen and truncate
//! - Recovery of the valid prefix after torn or corrupted writes

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tsm::config::WalSyncStrategy;
use tsm::wal::{Operation, RecoveryResult, WalEntry, WalReader, WalRecovery, WalWriter, HEADER_SIZE};
use tsm::TsmError;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn put_op(key: &str, value: &str) -> Operation {
    Operation::Put {
        path: vec![b"domain".to_vec(), b"series".to_vec()],
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

fn sample_entry(lsn: u64) -> WalEntry {
    WalEntry::new(
        lsn,
        vec![
            Operation::CreateBucket { path: vec![b"domain".to_vec()] },
            put_op(&format!("k{}", lsn), "v"),
        ],
    )
}

/// Write entries back to back, returning each frame's length
fn write_entries_to_wal(path: &Path, entries: &[WalEntry]) -> Vec<usize> {
    let mut file = File::create(path).unwrap();
    let mut lengths = Vec::new();
    for entry in entries {
        let bytes = entry.serialize().unwrap();
        file.write_all(&bytes).unwrap();
        lengths.push(bytes.len());
    }
    file.sync_all().unwrap();
    lengths
}

// =============================================================================
// Entry Tests
// =============================================================================

#[test]
fn test_entry_round_trip_all_operations() {
    let entry = WalEntry::new(
        7,
        vec![
            Operation::CreateBucket { path: vec![b"d".to_vec()] },
            Operation::CreateBucket { path: vec![b"d".to_vec(), b"s".to_vec()] },
            Operation::DeleteRange {
                path: vec![b"d".to_vec(), b"s".to_vec()],
                start: vec![0; 8],
                end: vec![0xFF; 8],
            },
            put_op("a", "1"),
            Operation::Delete {
                path: vec![b"d".to_vec(), b"s".to_vec()],
                key: b"a".to_vec(),
            },
        ],
    );

    let bytes = entry.serialize().unwrap();
    let recovered = WalEntry::deserialize(&bytes).unwrap();

    assert_eq!(entry, recovered);
}

#[test]
fn test_entry_empty_operations() {
    let entry = WalEntry::new(1, Vec::new());
    let recovered = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();
    assert!(recovered.operations.is_empty());
}

#[test]
fn test_entry_header_layout() {
    let entry = sample_entry(0x0102_0304);
    let bytes = entry.serialize().unwrap();

    assert_eq!(&bytes[0..8], &0x0102_0304u64.to_le_bytes());
    let len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;
    assert_eq!(bytes.len(), HEADER_SIZE + len);
}

#[test]
fn test_entry_crc_detects_body_corruption() {
    let mut bytes = sample_entry(1).serialize().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;

    let result = WalEntry::deserialize(&bytes);
    assert!(matches!(result, Err(TsmError::WalCorruption(_))));
}

#[test]
fn test_entry_crc_covers_lsn() {
    let mut bytes = sample_entry(1).serialize().unwrap();
    bytes[0] = 2;

    let result = WalEntry::deserialize(&bytes);
    assert!(matches!(result, Err(TsmError::WalCorruption(_))));
}

#[test]
fn test_entry_truncated_frames_rejected() {
    let bytes = sample_entry(1).serialize().unwrap();

    assert!(matches!(WalEntry::deserialize(&bytes[..10]), Err(TsmError::WalCorruption(_))));
    assert!(matches!(
        WalEntry::deserialize(&bytes[..bytes.len() - 1]),
        Err(TsmError::WalCorruption(_))
    ));
}

#[test]
fn test_entry_oversized_length_rejected() {
    let mut bytes = sample_entry(1).serialize().unwrap();
    bytes[12..16].copy_from_slice(&u32::MAX.to_le_bytes());

    let result = WalEntry::deserialize(&bytes);
    assert!(matches!(result, Err(TsmError::WalCorruption(_))));
}

// =============================================================================
// Reader Tests
// =============================================================================

#[test]
fn test_read_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_none());
    assert_eq!(reader.position(), 0);
}

#[test]
fn test_read_entries_in_order() {
    let (_temp, wal_path) = setup_temp_wal();
    let entries: Vec<_> = (1..=5).map(sample_entry).collect();
    let lengths = write_entries_to_wal(&wal_path, &entries);

    let reader = WalReader::open(&wal_path).unwrap();
    let read: Vec<WalEntry> = reader.map(|e| e.unwrap()).collect();
    assert_eq!(read, entries);

    let mut reader = WalReader::open(&wal_path).unwrap();
    while reader.next_entry().unwrap().is_some() {}
    assert_eq!(reader.position(), lengths.iter().sum::<usize>() as u64);
}

#[test]
fn test_read_stops_at_torn_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_to_wal(&wal_path, &[sample_entry(1)]);

    let torn = sample_entry(2).serialize().unwrap();
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&torn[..torn.len() / 2]).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert_eq!(reader.next().unwrap().unwrap().lsn, 1);
    assert!(matches!(reader.next(), Some(Err(TsmError::WalCorruption(_)))));
    assert!(reader.next().is_none());
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_writer_assigns_sequential_lsns() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    assert_eq!(writer.next_lsn(), 1);
    assert_eq!(writer.last_lsn(), 0);
    for expected in 1..=3 {
        assert_eq!(writer.append(vec![put_op("k", "v")]).unwrap(), expected);
    }
    assert_eq!(writer.entry_count(), 3);
    assert_eq!(writer.size(), fs::metadata(&wal_path).unwrap().len());
}

#[test]
fn test_writer_reopen_continues_lsn() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(vec![put_op("a", "1")]).unwrap();
        writer.append(vec![put_op("b", "2")]).unwrap();
    }

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.entry_count(), 2);
    assert_eq!(writer.append(vec![put_op("c", "3")]).unwrap(), 3);

    let lsns: Vec<u64> = WalReader::open(&wal_path).unwrap().map(|e| e.unwrap().lsn).collect();
    assert_eq!(lsns, vec![1, 2, 3]);
}

#[test]
fn test_writer_truncate_keeps_counting() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 2 }).unwrap();

    writer.append(vec![put_op("a", "1")]).unwrap();
    writer.append(vec![put_op("b", "2")]).unwrap();
    writer.truncate().unwrap();

    assert_eq!(writer.size(), 0);
    assert_eq!(writer.entry_count(), 0);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), 0);
    assert_eq!(writer.append(vec![put_op("c", "3")]).unwrap(), 3);
}

#[test]
fn test_writer_advance_lsn() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    writer.advance_lsn(41);
    assert_eq!(writer.next_lsn(), 42);

    // Never moves backwards
    writer.advance_lsn(10);
    assert_eq!(writer.next_lsn(), 42);
    assert_eq!(writer.append(vec![put_op("k", "v")]).unwrap(), 42);
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_clean_wal() {
    let (_temp, wal_path) = setup_temp_wal();
    let entries: Vec<_> = (1..=3).map(sample_entry).collect();
    write_entries_to_wal(&wal_path, &entries);

    let (recovered, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(recovered, entries);
    assert_eq!(
        result,
        RecoveryResult {
            entries_recovered: 3,
            entries_corrupted: 0,
            last_lsn: 3,
            was_truncated: false,
        }
    );
}

#[test]
fn test_recover_truncates_torn_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    let lengths = write_entries_to_wal(&wal_path, &[sample_entry(1), sample_entry(2)]);

    let torn = sample_entry(3).serialize().unwrap();
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&torn[..HEADER_SIZE + 2]).unwrap();
    drop(file);

    let (recovered, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(recovered.len(), 2);
    assert_eq!(result.last_lsn, 2);
    assert_eq!(result.entries_corrupted, 1);
    assert!(result.was_truncated);

    let valid_len: usize = lengths.iter().sum();
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), valid_len as u64);

    // A second pass finds a clean log
    let (_, again) = WalRecovery::recover(&wal_path).unwrap();
    assert!(!again.was_truncated);
    assert_eq!(again.entries_recovered, 2);
}

#[test]
fn test_recover_drops_everything_after_corruption() {
    let (_temp, wal_path) = setup_temp_wal();
    let lengths = write_entries_to_wal(
        &wal_path,
        &[sample_entry(1), sample_entry(2), sample_entry(3)],
    );

    // Flip the last body byte of entry 2
    let mut bytes = fs::read(&wal_path).unwrap();
    let offset = lengths[0] + lengths[1] - 1;
    bytes[offset] ^= 0xFF;
    fs::write(&wal_path, &bytes).unwrap();

    let (recovered, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].lsn, 1);
    assert_eq!(result.entries_corrupted, 1);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), lengths[0] as u64);
}

#[test]
fn test_verify_does_not_modify() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_to_wal(&wal_path, &[sample_entry(1)]);
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0xAB; 5]).unwrap();
    drop(file);
    let len_before = fs::metadata(&wal_path).unwrap().len();

    let result = WalRecovery::verify(&wal_path).unwrap();
    assert_eq!(result.entries_recovered, 1);
    assert_eq!(result.entries_corrupted, 1);
    assert!(!result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), len_before);
}

#[cfg(target_os = "linux")]
#[test]
fn test_failed_append_leaves_writer_unchanged() {
    let full = Path::new("/dev/full");
    if !full.exists() {
        return;
    }
    let (_temp, wal_path) = setup_temp_wal();
    std::os::unix::fs::symlink(full, &wal_path).unwrap();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    let (size, count, next) = (writer.size(), writer.entry_count(), writer.next_lsn());

    assert!(writer.append(vec![put_op("a", "1")]).is_err());
    assert!(writer.append(vec![put_op("b", "2")]).is_err());

    assert_eq!(writer.size(), size);
    assert_eq!(writer.entry_count(), count);
    assert_eq!(writer.next_lsn(), next);
}
