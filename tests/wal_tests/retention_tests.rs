//! Tests for segment rotation and retention

use std::sync::Arc;

use tablewal::wal::{Record, WalEntry};
use tablewal::{ObjectStore, WalConfig, WalError, WalManager};

use crate::common::{memory_store, open, FlakyStore, PREFIX};

// =============================================================================
// Helper Functions
// =============================================================================

fn rotating_config(retention_count: usize) -> WalConfig {
    WalConfig::builder()
        .key_prefix(PREFIX)
        .block_size(256)
        .max_segment_size(512)
        .retention_count(retention_count)
        .build()
}

fn entries(n: i64) -> Vec<WalEntry> {
    (0..n)
        .map(|i| WalEntry::update("t").with_record(Record::new().with(1, i)))
        .collect()
}

fn sequences(store: &Arc<dyn ObjectStore>, config: &WalConfig) -> Vec<u64> {
    let mut seqs: Vec<u64> = store
        .list(PREFIX)
        .unwrap()
        .iter()
        .filter_map(|key| config.parse_segment_key(key))
        .collect();
    seqs.sort_unstable();
    seqs
}

fn collect(manager: &WalManager) -> Vec<WalEntry> {
    manager
        .read_all()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

// =============================================================================
// Rotation Tests
// =============================================================================

#[test]
fn test_rotation_respects_max_segment_size() {
    let store = memory_store();
    let config = rotating_config(1000);
    let manager = open(&store, config.clone());

    let written = entries(200);
    for entry in &written {
        manager.append(entry.clone()).unwrap();
    }
    manager.terminate().unwrap();

    let seqs = sequences(&store, &config);
    assert!(seqs.len() > 1);
    assert_eq!(seqs, (0..seqs.len() as u64).collect::<Vec<_>>());
    for key in store.list(PREFIX).unwrap() {
        // Uncompressed, so the stored size is header plus raw body
        assert!(store.get(&key).unwrap().len() <= 512);
    }

    let reopened = open(&store, config);
    assert_eq!(collect(&reopened), written);
}

// =============================================================================
// Retention Tests
// =============================================================================

#[test]
fn test_retention_keeps_newest_segments() {
    let store = memory_store();
    let config = rotating_config(3);
    let manager = open(&store, config.clone());

    let written = entries(200);
    for entry in &written {
        manager.append(entry.clone()).unwrap();
    }
    manager.flush().unwrap();

    let seqs = sequences(&store, &config);
    assert_eq!(seqs.len(), 3);
    assert!(seqs[0] > 0);
    assert_eq!(seqs[1], seqs[0] + 1);
    assert_eq!(seqs[2], seqs[1] + 1);

    // What survives is the most recent tail of the log
    let recovered = collect(&manager);
    assert!(!recovered.is_empty());
    assert_eq!(recovered[..], written[written.len() - recovered.len()..]);
    manager.terminate().unwrap();
}

#[test]
fn test_retention_of_one_keeps_only_open_segment() {
    let store = memory_store();
    let config = rotating_config(1);
    let manager = open(&store, config.clone());

    for entry in entries(100) {
        manager.append(entry).unwrap();
    }
    manager.terminate().unwrap();

    let seqs = sequences(&store, &config);
    assert_eq!(seqs.len(), 1);
    assert!(seqs[0] > 0);
}

#[test]
fn test_retention_ignores_other_keys() {
    let store = memory_store();
    store.put("other/wal.log.0", b"x").unwrap();
    store.put("test/wal.log.old", b"x").unwrap();

    let config = rotating_config(2);
    let manager = open(&store, config.clone());
    for entry in entries(100) {
        manager.append(entry).unwrap();
    }
    manager.terminate().unwrap();

    assert_eq!(sequences(&store, &config).len(), 2);
    assert!(store.get("other/wal.log.0").is_ok());
    assert!(store.get("test/wal.log.old").is_ok());
}

#[test]
fn test_retention_not_applied_on_open() {
    let store = memory_store();
    let wide = rotating_config(1000);
    {
        let manager = open(&store, wide.clone());
        for entry in entries(100) {
            manager.append(entry).unwrap();
        }
        manager.terminate().unwrap();
    }
    let before = sequences(&store, &wide);
    assert!(before.len() > 2);

    // Opening with a tighter limit prunes nothing until the next rotation
    let manager = open(&store, rotating_config(2));
    manager.terminate().unwrap();
    assert_eq!(sequences(&store, &wide), before);
}

#[test]
fn test_retention_after_lost_segment() {
    let flaky = Arc::new(FlakyStore::new());
    let store: Arc<dyn ObjectStore> = flaky.clone();
    let config = rotating_config(2);
    let manager = open(&store, config.clone());

    // Ten frames fill a segment; twelve leave segment 1 open with two
    for entry in entries(12) {
        manager.append(entry).unwrap();
    }
    manager.flush().unwrap();
    assert_eq!(sequences(&store, &config), vec![0, 1]);

    // Re-upload of segment 1 fails; its earlier upload stays behind
    flaky.fail_next_puts(3);
    manager.append(entries(1).remove(0)).unwrap();
    assert!(matches!(
        manager.flush(),
        Err(WalError::Persistence { .. })
    ));

    manager.append(entries(1).remove(0)).unwrap();
    manager.flush().unwrap();
    assert_eq!(sequences(&store, &config), vec![1, 2]);
    manager.terminate().unwrap();
}
