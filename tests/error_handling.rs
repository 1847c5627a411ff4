//! Error handling and edge case tests.

use reaction_tracker::{
    Channel, FileStorage, FileStorageConfig, Identified, MemoryStorage, ReactionError,
    ReactionTracker, ReactorId, StorageAdapter, SubjectId, TrackerConfig,
};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn memory_tracker() -> ReactionTracker<Arc<MemoryStorage>> {
    let storage = Arc::new(MemoryStorage::with_subjects(["p1"]));
    ReactionTracker::new(storage, TrackerConfig::default())
}

struct Anonymous;

impl Identified for Anonymous {
    fn reactor_id(&self) -> ReactorId {
        ReactorId::new("")
    }
}

// --- Subject Errors ---

#[test]
fn test_add_to_unknown_subject() {
    let tracker = memory_tracker();

    let result = tracker.add(&"nope".into(), &Channel::LIKE, "u1");
    assert!(matches!(result, Err(ReactionError::NotFound(_))));
}

#[test]
fn test_has_on_unknown_subject() {
    let tracker = memory_tracker();

    let result = tracker.has(&"nope".into(), &Channel::LIKE, "u1");
    assert!(matches!(result, Err(ReactionError::NotFound(_))));
}

// --- Identity Errors ---

#[test]
fn test_empty_identity() {
    let tracker = memory_tracker();
    let p1 = SubjectId::new("p1");

    assert!(matches!(
        tracker.add(&p1, &Channel::LIKE, ""),
        Err(ReactionError::InvalidIdentity(_))
    ));
    assert!(matches!(
        tracker.remove(&p1, &Channel::LIKE, "   "),
        Err(ReactionError::InvalidIdentity(_))
    ));
    assert!(matches!(
        tracker.has(&p1, &Channel::LIKE, &Anonymous),
        Err(ReactionError::InvalidIdentity(_))
    ));

    assert_eq!(tracker.storage().save_count(), 0);
}

// --- Idempotence ---

#[test]
fn test_remove_never_added_is_noop() {
    let tracker = memory_tracker();
    let p1 = SubjectId::new("p1");

    let before = tracker.state(&p1, &Channel::DISLIKE).unwrap();
    let after = tracker.remove(&p1, &Channel::DISLIKE, "stranger").unwrap();

    assert_eq!(before, after);
    assert_eq!(after.count(), 0);
}

// --- Persistence Errors ---

#[test]
fn test_failed_save_leaves_state_untouched() {
    let tracker = memory_tracker();
    let p1 = SubjectId::new("p1");

    tracker.add(&p1, &Channel::LIKE, "u1").unwrap();
    tracker.add(&p1, &Channel::LIKE, "u2").unwrap();
    let before = tracker.state(&p1, &Channel::LIKE).unwrap();

    tracker.storage().fail_next_saves(2);

    let err = tracker.remove(&p1, &Channel::LIKE, "u1").unwrap_err();
    assert!(err.is_persistence());
    let err = tracker.add(&p1, &Channel::LIKE, "u3").unwrap_err();
    assert!(err.is_persistence());

    assert_eq!(tracker.state(&p1, &Channel::LIKE).unwrap(), before);
    assert_eq!(tracker.storage().load(&p1, &Channel::LIKE).unwrap(), before);
}

// --- Storage Errors ---

#[test]
fn test_open_nonexistent_storage() {
    let dir = TempDir::new().unwrap();

    let result = FileStorage::open(FileStorageConfig {
        path: dir.path().join("nonexistent"),
        create_if_missing: false,
        sync_writes: true,
    });

    assert!(result.is_err());
}

#[test]
fn test_concurrent_storage_access() {
    let dir = TempDir::new().unwrap();
    let config = FileStorageConfig {
        path: dir.path().join("reactions"),
        ..Default::default()
    };

    let _storage1 = FileStorage::create(config.clone()).unwrap();

    // Second handle should fail with lock error
    let result = FileStorage::open(config);
    assert!(matches!(result, Err(ReactionError::Locked)));
}

#[test]
fn test_corrupt_manifest() {
    let dir = TempDir::new().unwrap();
    let config = FileStorageConfig {
        path: dir.path().join("reactions"),
        ..Default::default()
    };

    drop(FileStorage::create(config.clone()).unwrap());
    fs::write(config.path.join("MANIFEST"), b"JUNK\x01").unwrap();

    let result = FileStorage::open(config);
    assert!(matches!(result, Err(ReactionError::InvalidFormat(_))));
}

#[test]
fn test_torn_log_tail_recovers() {
    let dir = TempDir::new().unwrap();
    let config = FileStorageConfig {
        path: dir.path().join("reactions"),
        ..Default::default()
    };
    let p1 = SubjectId::new("p1");

    {
        let storage = FileStorage::create(config.clone()).unwrap();
        let tracker = ReactionTracker::new(storage, TrackerConfig::default());
        tracker.storage().register_subject(&p1).unwrap();
        tracker.add(&p1, &Channel::LIKE, "u1").unwrap();
        tracker.add(&p1, &Channel::LIKE, "u2").unwrap();
    }

    // Simulate a crash halfway through a third append
    let log_path = config.path.join("reactions.log");
    let mut data = fs::read(&log_path).unwrap();
    data.extend_from_slice(&[200, 0, 0, 0, 0x93, 0x01]);
    fs::write(&log_path, &data).unwrap();

    let storage = FileStorage::open(config).unwrap();
    let tracker = ReactionTracker::new(storage, TrackerConfig::default());
    let state = tracker.state(&p1, &Channel::LIKE).unwrap();
    assert_eq!(state.count(), 2);

    tracker.add(&p1, &Channel::LIKE, "u3").unwrap();
    assert_eq!(tracker.count(&p1, &Channel::LIKE).unwrap(), 3);
}

#[test]
fn test_corrupt_length_mid_log_is_not_truncated() {
    let dir = TempDir::new().unwrap();
    let config = FileStorageConfig {
        path: dir.path().join("reactions"),
        ..Default::default()
    };
    let p1 = SubjectId::new("p1");

    {
        let storage = FileStorage::create(config.clone()).unwrap();
        let tracker = ReactionTracker::new(storage, TrackerConfig::default());
        tracker.storage().register_subject(&p1).unwrap();
        for i in 0..5 {
            tracker.add(&p1, &Channel::LIKE, format!("u{}", i)).unwrap();
        }
    }

    // Frame 1 starts after the 5-byte header; bump frame 2's length prefix
    let log_path = config.path.join("reactions.log");
    let mut data = fs::read(&log_path).unwrap();
    let first = u32::from_le_bytes([data[5], data[6], data[7], data[8]]) as usize;
    let second = 5 + 4 + first + 4;
    data[second + 2] ^= 0x10;
    fs::write(&log_path, &data).unwrap();

    let result = FileStorage::open(config);
    assert!(matches!(result, Err(ReactionError::Corruption(_))));
    assert_eq!(fs::read(&log_path).unwrap(), data);
}
