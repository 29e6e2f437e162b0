//! Tests for the copy-on-write bucket tree
//!
//! These tests verify:
//! - Clones share nested buckets until one side writes
//! - Writes through a clone never show up in the tree it was cloned from
//! - Replaying commit records rebuilds the same tree

use std::sync::Arc;

use bytes::Bytes;
use usercollect::tree::{Bucket, Node};
use usercollect::wal::{CommitRecord, Operation};
use usercollect::CollectError;

// =============================================================================
// Helper Functions
// =============================================================================

fn sample_root() -> Bucket {
    let mut root = Bucket::new();
    let users = root.create_bucket(b"users").unwrap();
    users.put(b"a", Bytes::from_static(b"1")).unwrap();
    users.create_bucket(b"index").unwrap();
    root.create_bucket(b"other").unwrap();
    root
}

fn shared_child(root: &Bucket, name: &[u8]) -> Arc<Bucket> {
    match root.node(name) {
        Some(Node::Bucket(bucket)) => Arc::clone(bucket),
        other => panic!("expected a bucket, got {:?}", other),
    }
}

// =============================================================================
// Copy-on-Write Tests
// =============================================================================

#[test]
fn test_clone_shares_children() {
    let root = sample_root();
    let copy = root.clone();

    assert!(Arc::ptr_eq(
        &shared_child(&root, b"users"),
        &shared_child(&copy, b"users")
    ));
}

#[test]
fn test_write_detaches_only_touched_path() {
    let root = sample_root();
    let mut copy = root.clone();

    copy.bucket_mut(b"users")
        .unwrap()
        .put(b"b", Bytes::from_static(b"2"))
        .unwrap();

    assert!(!Arc::ptr_eq(
        &shared_child(&root, b"users"),
        &shared_child(&copy, b"users")
    ));
    assert!(Arc::ptr_eq(
        &shared_child(&root, b"other"),
        &shared_child(&copy, b"other")
    ));

    assert!(root.bucket(b"users").unwrap().value(b"b").is_none());
    assert_eq!(
        copy.bucket(b"users").unwrap().value(b"b"),
        Some(&Bytes::from_static(b"2"))
    );
}

#[test]
fn test_large_bucket_clone_is_independent() {
    let mut root = Bucket::new();
    let users = root.create_bucket(b"users").unwrap();
    for i in 0..10_000u64 {
        users.put(&i.to_be_bytes(), Bytes::from(i.to_string())).unwrap();
    }

    let snapshot = root.clone();
    let users = root.bucket_mut(b"users").unwrap();
    users.put(&5u64.to_be_bytes(), Bytes::from_static(b"changed")).unwrap();
    users.put(&10_000u64.to_be_bytes(), Bytes::from_static(b"new")).unwrap();

    let before = snapshot.bucket(b"users").unwrap();
    assert_eq!(before.len(), 10_000);
    assert_eq!(before.value(&5u64.to_be_bytes()), Some(&Bytes::from_static(b"5")));
    assert!(before.value(&10_000u64.to_be_bytes()).is_none());

    let after = root.bucket(b"users").unwrap();
    assert_eq!(after.len(), 10_001);
    assert_eq!(
        after.value(&5u64.to_be_bytes()),
        Some(&Bytes::from_static(b"changed"))
    );
    assert_eq!(after.iter().count(), 10_001);
}

#[test]
fn test_sequence_is_per_bucket_and_copied() {
    let mut root = sample_root();
    root.bucket_mut(b"users").unwrap().set_sequence(7);
    let mut copy = root.clone();
    copy.bucket_mut(b"users").unwrap().set_sequence(8);

    assert_eq!(root.bucket(b"users").unwrap().sequence(), 7);
    assert_eq!(copy.bucket(b"users").unwrap().sequence(), 8);
    assert_eq!(root.bucket(b"other").unwrap().sequence(), 0);
}

#[test]
fn test_range_from_is_ordered() {
    let mut bucket = Bucket::new();
    for key in ["b", "d", "a", "c"] {
        bucket.put(key.as_bytes(), Bytes::new()).unwrap();
    }

    let keys: Vec<&[u8]> = bucket.range_from(b"b").map(|(k, _)| k).collect();
    assert_eq!(keys, vec![&b"b"[..], &b"c"[..], &b"d"[..]]);
}

// =============================================================================
// Replay Tests
// =============================================================================

#[test]
fn test_apply_record_rebuilds_tree() {
    let record = CommitRecord::new(
        1,
        vec![
            Operation::CreateBucket { path: vec![b"users".to_vec()] },
            Operation::CreateBucket { path: vec![b"users".to_vec(), b"index".to_vec()] },
            Operation::SetSequence { bucket: vec![b"users".to_vec()], sequence: 3 },
            Operation::Put {
                bucket: vec![b"users".to_vec(), b"index".to_vec()],
                key: b"k".to_vec(),
                value: b"v".to_vec(),
            },
        ],
    );

    let mut root = Bucket::new();
    root.apply_record(record).unwrap();

    let users = root.bucket(b"users").unwrap();
    assert_eq!(users.sequence(), 3);
    assert_eq!(
        users.bucket(b"index").unwrap().value(b"k"),
        Some(&Bytes::from_static(b"v"))
    );
}

#[test]
fn test_apply_into_missing_bucket_is_corruption() {
    let record = CommitRecord::new(
        1,
        vec![Operation::Put {
            bucket: vec![b"missing".to_vec()],
            key: b"k".to_vec(),
            value: b"v".to_vec(),
        }],
    );

    let mut root = Bucket::new();
    assert!(matches!(
        root.apply_record(record),
        Err(CollectError::Corruption(_))
    ));
}
