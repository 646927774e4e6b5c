//! Tests for WAL recovery
//!
//! These tests verify:
//! - Replay across restarts, in write order
//! - Sequence numbering continues after the highest existing segment
//! - Compressed and uncompressed segments read back alike
//! - Corrupted segments end the scan with an error
//! - Segments are fetched lazily

use std::sync::Arc;
use std::time::Duration;

use tablewal::wal::{ColumnType, Record, SegmentHeader, WalEntry, WalReader};
use tablewal::{FsObjectStore, ObjectStore, WalConfig, WalError, WalManager};
use tempfile::TempDir;

use crate::common::{int_records, memory_store, open, schema, test_config, FlakyStore, PREFIX};

// =============================================================================
// Helper Functions
// =============================================================================

fn collect(manager: &WalManager) -> Vec<WalEntry> {
    manager
        .read_all()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn sequences(store: &Arc<dyn ObjectStore>, config: &WalConfig) -> Vec<u64> {
    let mut seqs: Vec<u64> = store
        .list(&config.key_prefix)
        .unwrap()
        .iter()
        .filter_map(|key| config.parse_segment_key(key))
        .collect();
    seqs.sort_unstable();
    seqs
}

fn batch(table: &str, range: std::ops::Range<i64>) -> Vec<WalEntry> {
    range
        .map(|i| WalEntry::update(table).with_record(Record::new().with(1, i).with(2, format!("row-{}", i))))
        .collect()
}

fn write_run(store: &Arc<dyn ObjectStore>, config: WalConfig, entries: &[WalEntry]) {
    let manager = open(store, config);
    for entry in entries {
        manager.append(entry.clone()).unwrap();
    }
    manager.terminate().unwrap();
}

// =============================================================================
// Restart Tests
// =============================================================================

#[test]
fn test_recovery_across_restarts() {
    let store = memory_store();
    let config = test_config();

    let first = batch("a", 0..20);
    write_run(&store, config.clone(), &first);
    let after_first = sequences(&store, &config);
    assert_eq!(after_first.first(), Some(&0));

    let second = batch("b", 0..20);
    write_run(&store, config.clone(), &second);
    let after_second = sequences(&store, &config);

    // The second run never reopens a segment of the first
    let last_of_first = *after_first.last().unwrap();
    let new: Vec<u64> = after_second
        .iter()
        .copied()
        .filter(|s| !after_first.contains(s))
        .collect();
    assert!(!new.is_empty());
    assert!(new.iter().all(|&s| s > last_of_first));
    assert_eq!(new[0], last_of_first + 1);

    let manager = open(&store, config);
    let expected: Vec<WalEntry> = first.into_iter().chain(second).collect();
    assert_eq!(collect(&manager), expected);
    manager.terminate().unwrap();
}

#[test]
fn test_recovery_many_entries() {
    let store = memory_store();
    let config = WalConfig::builder()
        .key_prefix(PREFIX)
        .block_size(4096)
        .max_segment_size(64 * 1024)
        .retention_count(10_000)
        .build();

    let mut entries = vec![WalEntry::update("stress").with_schema(schema(
        Some("id"),
        &[(1, "id", ColumnType::Int), (2, "label", ColumnType::String)],
    ))];
    entries.extend(batch("stress", 0..50_000));

    write_run(&store, config.clone(), &entries);
    assert!(sequences(&store, &config).len() > 1);

    let manager = open(&store, config);
    assert_eq!(collect(&manager), entries);
    manager.terminate().unwrap();
}

#[test]
fn test_recovery_from_filesystem_store() {
    let temp = TempDir::new().unwrap();
    let config = test_config();
    let entries = batch("fs", 0..100);

    {
        let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::open(temp.path()).unwrap());
        write_run(&store, config.clone(), &entries);
    }

    let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::open(temp.path()).unwrap());
    let manager = open(&store, config);
    assert_eq!(collect(&manager), entries);
    manager.terminate().unwrap();
}

// =============================================================================
// Compression Tests
// =============================================================================

#[test]
fn test_compressed_and_plain_segments_mix() {
    let temp = TempDir::new().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::open(temp.path()).unwrap());

    let compressed_config = WalConfig::builder()
        .key_prefix(PREFIX)
        .compression(true)
        .flush_interval(Duration::from_millis(1))
        .build();
    let plain_config = WalConfig::builder()
        .key_prefix(PREFIX)
        .flush_interval(Duration::from_millis(1))
        .build();

    let first = batch("lz", 0..200);
    write_run(&store, compressed_config, &first);
    let header = SegmentHeader::from_bytes(&store.get("test/wal.log.0").unwrap()).unwrap();
    assert!(header.compressed);

    let second = batch("plain", 0..50);
    write_run(&store, plain_config.clone(), &second);
    let header = SegmentHeader::from_bytes(&store.get("test/wal.log.1").unwrap()).unwrap();
    assert!(!header.compressed);

    let manager = open(&store, plain_config);
    let expected: Vec<WalEntry> = first.into_iter().chain(second).collect();
    assert_eq!(collect(&manager), expected);
    manager.terminate().unwrap();
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_garbage_segment_is_corruption() {
    let store = memory_store();
    store.put("test/wal.log.0", b"not a segment").unwrap();

    let reader = WalReader::new(Arc::clone(&store), test_config());
    let mut scan = reader.read_all().unwrap();

    assert!(matches!(scan.next(), Some(Err(WalError::Corruption(_)))));
    assert!(scan.next().is_none());
}

#[test]
fn test_corruption_after_good_segment() {
    let store = memory_store();
    let config = test_config();

    let first = batch("a", 0..5);
    write_run(&store, config.clone(), &first);
    write_run(&store, config.clone(), &batch("b", 0..5));

    // Flip one body byte of the second run's segment
    let mut object = store.get("test/wal.log.1").unwrap().to_vec();
    let last = object.len() - 1;
    object[last] ^= 0xff;
    store.put("test/wal.log.1", &object).unwrap();

    let reader = WalReader::new(Arc::clone(&store), config);
    let results: Vec<_> = reader.read_all().unwrap().collect();

    assert_eq!(results.len(), first.len() + 1);
    for (result, expected) in results.iter().zip(&first) {
        assert_eq!(result.as_ref().unwrap(), expected);
    }
    assert!(matches!(results.last(), Some(Err(WalError::Corruption(_)))));
}

#[test]
fn test_scan_counts_only_readable_frames() {
    let store = memory_store();
    let config = test_config();

    // Checksum is valid, but the second frame runs past the body
    let good = WalEntry::update("t").with_records(int_records(0..4));
    let mut body = tablewal::wal::encode_entry(&good).unwrap();
    body.extend_from_slice(&[0, 0, 0, 99, 1]);
    let object = tablewal::wal::seal(&body, false, &tablewal::BufferPool::new());
    store.put("test/wal.log.0", &object).unwrap();

    let reader = WalReader::new(Arc::clone(&store), config);
    let scan = reader.scan_segment("test/wal.log.0").unwrap();
    assert_eq!(scan.stored_len, object.len());
    assert_eq!(scan.frames, 1);
    assert_eq!(scan.records, 4);
    assert!(matches!(scan.error, Some(WalError::Corruption(_))));

    assert!(matches!(
        reader.read_segment("test/wal.log.0"),
        Err(WalError::Corruption(_))
    ));
}

#[test]
fn test_scan_of_clean_segment() {
    let store = memory_store();
    let entries = batch("t", 0..7);
    write_run(&store, test_config(), &entries);

    let reader = WalReader::new(Arc::clone(&store), test_config());
    let scan = reader.scan_segment("test/wal.log.0").unwrap();
    assert_eq!(scan.frames, 7);
    assert_eq!(scan.records, 7);
    assert!(scan.error.is_none());
    assert_eq!(reader.read_segment("test/wal.log.0").unwrap(), entries);
}

#[test]
fn test_foreign_keys_are_ignored() {
    let store = memory_store();
    store.put("test/wal.log.", b"x").unwrap();
    store.put("test/wal.log.12a", b"x").unwrap();
    store.put("test/notes.txt", b"x").unwrap();
    store.put("other/wal.log.3", b"x").unwrap();

    let entries = batch("t", 0..3);
    write_run(&store, test_config(), &entries);
    assert_eq!(sequences(&store, &test_config()), vec![0]);

    let manager = open(&store, test_config());
    assert_eq!(collect(&manager), entries);
    manager.terminate().unwrap();
}

#[test]
fn test_segments_listed_in_numeric_order() {
    let store = memory_store();
    let config = test_config();

    // Lexicographic order would put 10 before 9
    for (seq, table) in [(9u64, "nine"), (10, "ten"), (2, "two")] {
        let body = tablewal::wal::encode_entry(&WalEntry::update(table)).unwrap();
        let object = tablewal::wal::seal(&body, false, &tablewal::BufferPool::new());
        store.put(&config.segment_key(seq), &object).unwrap();
    }

    let reader = WalReader::new(Arc::clone(&store), config);
    let order: Vec<u64> = reader.segments().unwrap().iter().map(|s| s.sequence).collect();
    assert_eq!(order, vec![2, 9, 10]);

    let tables: Vec<String> = reader
        .read_all()
        .unwrap()
        .map(|e| e.unwrap().table_name)
        .collect();
    assert_eq!(tables, vec!["two", "nine", "ten"]);
}

// =============================================================================
// Laziness Tests
// =============================================================================

#[test]
fn test_read_all_fetches_lazily() {
    let flaky = Arc::new(FlakyStore::new());
    let store: Arc<dyn ObjectStore> = flaky.clone();
    let config = test_config();

    write_run(&store, config.clone(), &batch("a", 0..3));
    write_run(&store, config.clone(), &batch("b", 0..3));

    let reader = WalReader::new(Arc::clone(&store), config);
    let mut scan = reader.read_all().unwrap();
    assert_eq!(scan.remaining_segments(), 2);
    assert_eq!(flaky.calls("get", "test/wal.log.0"), 0);

    scan.next().unwrap().unwrap();
    assert_eq!(scan.remaining_segments(), 1);
    assert_eq!(flaky.calls("get", "test/wal.log.0"), 1);
    assert_eq!(flaky.calls("get", "test/wal.log.1"), 0);

    assert_eq!(scan.count(), 5);
    assert_eq!(flaky.calls("get", "test/wal.log.1"), 1);
    assert_eq!(flaky.inner().len(), 2);
}

#[test]
fn test_empty_entries_round_trip() {
    let store = memory_store();
    let entries = vec![
        WalEntry::update("t"),
        WalEntry::delete("t"),
        WalEntry::update("t").with_records(int_records(0..1)),
    ];
    write_run(&store, test_config(), &entries);

    let manager = open(&store, test_config());
    assert_eq!(collect(&manager), entries);
    manager.terminate().unwrap();
}
