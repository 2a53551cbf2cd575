//! Snapshot and reopen tests
//!
//! A collection saved mid-pass and reopened must keep evicting exactly as if
//! it had never been closed

use cartridge_capped::{CappedCollection, CappedConfig, CappedError, ErrorClass};
use tempfile::TempDir;

fn config() -> CappedConfig {
    CappedConfig::new("test.restart", vec![1024, 1024, 2048])
        .unwrap()
        .with_max_records(12)
}

fn payload(i: u32) -> Vec<u8> {
    let mut p = vec![i as u8; 20 + (i as usize % 9) * 6];
    p[..4].copy_from_slice(&i.to_le_bytes());
    p
}

#[test]
fn test_reopen_mid_pass_matches_uninterrupted_run() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("restart.capd");

    let control = CappedCollection::create(config()).unwrap();
    let saved = CappedCollection::create(config()).unwrap();

    for i in 0..57 {
        control.write().insert(&payload(i)).unwrap().unwrap();
        saved.write().insert(&payload(i)).unwrap().unwrap();
    }
    saved.save(&path).unwrap();
    drop(saved);

    let reopened = CappedCollection::open(&path, config()).unwrap();
    assert_eq!(reopened.stats().unwrap(), control.stats().unwrap());

    for i in 57..140 {
        control.write().insert(&payload(i)).unwrap().unwrap();
        reopened.write().insert(&payload(i)).unwrap().unwrap();
    }

    assert_eq!(
        reopened.write().records().unwrap(),
        control.write().records().unwrap()
    );
    assert_eq!(reopened.stats().unwrap(), control.stats().unwrap());
}

#[test]
fn test_repeated_save_open_cycles() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cycles.capd");

    let mut expected = Vec::new();
    CappedCollection::create(config()).unwrap().save(&path).unwrap();

    for round in 0..6u32 {
        let coll = CappedCollection::open(&path, config()).unwrap();
        {
            let mut w = coll.write();
            for j in 0..7 {
                let p = payload(round * 7 + j);
                w.insert(&p).unwrap().unwrap();
                expected.push(p);
            }
        }
        coll.save(&path).unwrap();
    }

    let coll = CappedCollection::open(&path, config()).unwrap();
    let live = coll.write().records().unwrap();
    assert_eq!(live.len(), 12);
    assert_eq!(live[..], expected[expected.len() - 12..]);
}

#[test]
fn test_corrupted_snapshot_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corrupt.capd");

    let coll = CappedCollection::create(config()).unwrap();
    coll.write().insert(b"payload").unwrap().unwrap();
    coll.save(&path).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let idx = bytes.len() / 3;
    bytes[idx] = bytes[idx].wrapping_add(1);
    std::fs::write(&path, &bytes).unwrap();

    let err = CappedCollection::open(&path, config()).err().unwrap();
    assert!(matches!(err, CappedError::ChecksumMismatch));
    assert_eq!(err.class(), ErrorClass::Corruption);
}

#[test]
fn test_missing_snapshot_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = CappedCollection::open(dir.path().join("absent.capd"), config())
        .err()
        .unwrap();

    assert_eq!(err.class(), ErrorClass::Io);
    assert!(!err.is_fatal());
}
