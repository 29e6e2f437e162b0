//! Tests for the User Store
//!
//! These tests verify:
//! - Lifecycle (open, open_existing, init, close) and misuse errors
//! - add_user id assignment, validation and index maintenance
//! - Exact and prefix lookups
//! - Id continuity across reopen and gaps left by failed adds
//! - Concurrent adds

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tempfile::TempDir;
use usercollect::config::{DbOptions, SyncStrategy};
use usercollect::storage::Db;
use usercollect::users::schema::{
    EMAIL_INDEX_BUCKET, PHONE_INDEX_BUCKET, USERS_BUCKET, USER_EVENTS_BUCKET,
};
use usercollect::{CollectError, User, UserStore};

// =============================================================================
// Helper Functions
// =============================================================================

fn options() -> DbOptions {
    DbOptions {
        lock_timeout: Duration::from_millis(200),
        sync_strategy: SyncStrategy::OsBuffered,
    }
}

fn setup_temp_store() -> (TempDir, PathBuf, UserStore) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("users.db");
    let store = UserStore::open_path(&path, options()).unwrap();
    (temp_dir, path, store)
}

fn add(store: &UserStore, email: &str, phone: &str) -> u64 {
    store.add_user(User::new(email, phone)).unwrap()
}

/// Count entries in one of the nested buckets under `users`
fn nested_len(path: &PathBuf, name: &[u8]) -> usize {
    let db = Db::open(path, options()).unwrap();
    db.view(|tx| {
        Ok(tx
            .bucket(USERS_BUCKET)
            .and_then(|users| users.bucket(name))
            .map(|bucket| bucket.len())
            .unwrap_or(0))
    })
    .unwrap()
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_open_init_close() {
    let temp = TempDir::new().unwrap();
    let store = UserStore::new(options());
    assert!(!store.is_open());

    store.open(temp.path().join("users.db")).unwrap();
    assert!(store.is_open());
    store.init().unwrap();
    store.close().unwrap();
    assert!(!store.is_open());
}

#[test]
fn test_double_open_fails() {
    let (temp, _path, store) = setup_temp_store();
    let result = store.open(temp.path().join("other.db"));
    assert!(matches!(result, Err(CollectError::AlreadyOpen)));
}

#[test]
fn test_double_close_fails() {
    let (_temp, _path, store) = setup_temp_store();
    store.close().unwrap();
    assert!(matches!(store.close(), Err(CollectError::NotOpen)));
}

#[test]
fn test_operations_on_closed_store_fail() {
    let store = UserStore::new(options());

    assert!(matches!(store.init(), Err(CollectError::NotOpen)));
    assert!(matches!(
        store.add_user(User::new("a@b.com", "")),
        Err(CollectError::NotOpen)
    ));
    assert!(matches!(store.get_user(1), Err(CollectError::NotOpen)));
    assert!(matches!(
        store.get_user_id_by_email("a@b.com"),
        Err(CollectError::NotOpen)
    ));
    assert!(matches!(
        store.get_user_ids_matching_email_prefix(""),
        Err(CollectError::NotOpen)
    ));
    assert!(matches!(store.size(), Err(CollectError::NotOpen)));
}

#[test]
fn test_init_is_idempotent() {
    let (_temp, _path, store) = setup_temp_store();
    let id = add(&store, "a@b.com", "555");

    store.init().unwrap();
    store.init().unwrap();

    assert_eq!(store.get_user(id).unwrap().email, "a@b.com");
}

#[test]
fn test_init_creates_all_buckets() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("users.db");
    UserStore::open_path(&path, options()).unwrap().close().unwrap();

    let db = Db::open(&path, options()).unwrap();
    db.view(|tx| {
        let users = tx.bucket(USERS_BUCKET).unwrap();
        for name in [USER_EVENTS_BUCKET, EMAIL_INDEX_BUCKET, PHONE_INDEX_BUCKET] {
            assert!(users.bucket(name).is_some());
        }
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_add_before_init_fails() {
    let temp = TempDir::new().unwrap();
    let store = UserStore::new(options());
    store.open(temp.path().join("users.db")).unwrap();

    let result = store.add_user(User::new("a@b.com", ""));
    assert!(matches!(result, Err(CollectError::BucketNotFound(_))));
}

#[test]
fn test_open_existing_refuses_missing_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("absent.db");

    let store = UserStore::new(options());
    let result = store.open_existing(&path);

    assert!(matches!(result, Err(CollectError::NotFound(_))));
    assert!(!store.is_open());
    assert!(!path.exists());
}

#[test]
fn test_open_existing_refuses_uninitialised_store() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("users.db");
    drop(Db::open(&path, options()).unwrap());

    let store = UserStore::new(options());
    let result = store.open_existing(&path);

    assert!(matches!(result, Err(CollectError::NotFound(_))));
    assert!(!store.is_open());
    // The lock was released again
    UserStore::open_path(&path, options()).unwrap();
}

#[test]
fn test_open_existing_reads_initialised_store() {
    let (_temp, path, store) = setup_temp_store();
    let id = add(&store, "a@b.com", "555");
    store.close().unwrap();

    let reader = UserStore::new(options());
    reader.open_existing(&path).unwrap();
    assert_eq!(reader.get_user_id_by_phone("555").unwrap(), id);
    reader.close().unwrap();
}

#[test]
fn test_open_locked_file_times_out() {
    let (_temp, path, _store) = setup_temp_store();

    let other = UserStore::new(options());
    let result = other.open(&path);
    assert!(matches!(result, Err(CollectError::LockTimeout { .. })));
    assert!(!other.is_open());
}

#[test]
fn test_close_releases_lock() {
    let (_temp, path, store) = setup_temp_store();
    store.close().unwrap();

    let other = UserStore::open_path(&path, options()).unwrap();
    assert!(other.is_open());
}

// =============================================================================
// Add User Tests
// =============================================================================

#[test]
fn test_sequential_ids_increase() {
    let (_temp, _path, store) = setup_temp_store();

    let ids: Vec<u64> = (0..10)
        .map(|i| add(&store, &format!("user{}@example.com", i), ""))
        .collect();

    assert_eq!(ids, (1..=10).collect::<Vec<u64>>());
}

#[test]
fn test_get_user_round_trip() {
    let (_temp, _path, store) = setup_temp_store();
    let id = add(&store, "a@b.com", "555");

    let user = store.get_user(id).unwrap();
    assert_eq!(user, User { id, email: "a@b.com".to_string(), phone: "555".to_string() });
}

#[test]
fn test_supplied_id_is_ignored() {
    let (_temp, _path, store) = setup_temp_store();
    let candidate = User { id: 99, email: "a@b.com".to_string(), phone: String::new() };

    let id = store.add_user(candidate).unwrap();
    assert_eq!(id, 1);
    assert_eq!(store.get_user(1).unwrap().id, 1);
    assert!(matches!(store.get_user(99), Err(CollectError::NotFound(_))));
}

#[test]
fn test_invalid_email_rejected() {
    let (_temp, _path, store) = setup_temp_store();
    add(&store, "a@b.com", "");

    let result = store.add_user(User::new("not-an-email", "555"));
    assert!(matches!(result, Err(CollectError::Validation(_))));
    assert_eq!(store.user_count().unwrap(), 1);
    assert!(store.get_user_id_by_phone("555").is_err());
}

#[test]
fn test_duplicate_email_rejected() {
    let (_temp, _path, store) = setup_temp_store();
    add(&store, "a@b.com", "1");

    let result = store.add_user(User::new("a@b.com", "2"));
    assert!(matches!(result, Err(CollectError::Validation(_))));
    assert_eq!(store.user_count().unwrap(), 1);
    assert_eq!(store.get_user_id_by_email("a@b.com").unwrap(), 1);
}

#[test]
fn test_duplicate_phone_rejected_but_empty_phone_shared() {
    let (_temp, _path, store) = setup_temp_store();
    add(&store, "a@b.com", "555");

    let result = store.add_user(User::new("c@d.com", "555"));
    assert!(matches!(result, Err(CollectError::Validation(_))));

    add(&store, "e@f.com", "");
    add(&store, "g@h.com", "");
    assert_eq!(store.user_count().unwrap(), 3);
}

#[test]
fn test_rejected_duplicate_does_not_consume_id() {
    let (_temp, _path, store) = setup_temp_store();
    add(&store, "a@b.com", "");
    assert!(store.add_user(User::new("a@b.com", "")).is_err());

    assert_eq!(add(&store, "c@d.com", ""), 2);
}

#[test]
fn test_add_writes_indexes_and_event_bucket() {
    let (_temp, path, store) = setup_temp_store();
    add(&store, "a@b.com", "555");
    add(&store, "c@d.com", "");
    store.close().unwrap();

    assert_eq!(nested_len(&path, EMAIL_INDEX_BUCKET), 2);
    assert_eq!(nested_len(&path, PHONE_INDEX_BUCKET), 1);
    assert_eq!(nested_len(&path, USER_EVENTS_BUCKET), 2);
}

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_lookup_by_email_and_phone() {
    let (_temp, _path, store) = setup_temp_store();
    add(&store, "x@y.com", "111");
    let id = add(&store, "a@b.com", "555");

    assert_eq!(store.get_user_id_by_email("a@b.com").unwrap(), id);
    assert_eq!(store.get_user_id_by_phone("555").unwrap(), id);
}

#[test]
fn test_lookup_misses_are_not_found() {
    let (_temp, _path, store) = setup_temp_store();
    add(&store, "a@b.com", "555");

    assert!(matches!(
        store.get_user_id_by_email("A@B.COM"),
        Err(CollectError::NotFound(_))
    ));
    assert!(matches!(
        store.get_user_id_by_phone("556"),
        Err(CollectError::NotFound(_))
    ));
    assert!(matches!(store.get_user(42), Err(CollectError::NotFound(_))));
}

#[test]
fn test_prefix_search_in_email_order() {
    let (_temp, _path, store) = setup_temp_store();
    let johnny = add(&store, "johnny@y.com", "");
    let jane = add(&store, "jane@z.com", "");
    let john = add(&store, "john.doe@x.com", "");

    assert_eq!(
        store.get_user_ids_matching_email_prefix("john").unwrap(),
        vec![john, johnny]
    );
    assert_eq!(
        store.get_user_ids_matching_email_prefix("").unwrap(),
        vec![jane, john, johnny]
    );
    assert_eq!(
        store.get_user_ids_matching_email_prefix("jane@z.com").unwrap(),
        vec![jane]
    );
}

#[test]
fn test_prefix_search_without_match_is_not_found() {
    let (_temp, _path, store) = setup_temp_store();
    add(&store, "jane@z.com", "");

    assert!(matches!(
        store.get_user_ids_matching_email_prefix("zed"),
        Err(CollectError::NotFound(_))
    ));
    assert!(matches!(
        store.get_user_ids_matching_email_prefix("JANE"),
        Err(CollectError::NotFound(_))
    ));
}

#[test]
fn test_prefix_search_on_empty_store_is_not_found() {
    let (_temp, _path, store) = setup_temp_store();
    assert!(matches!(
        store.get_user_ids_matching_email_prefix(""),
        Err(CollectError::NotFound(_))
    ));
}

#[test]
fn test_corrupt_record_detected() {
    let (_temp, path, store) = setup_temp_store();
    add(&store, "a@b.com", "");
    store.close().unwrap();

    {
        let db = Db::open(&path, options()).unwrap();
        db.update(|tx| {
            tx.bucket_mut(USERS_BUCKET)
                .unwrap()
                .put(&usercollect::codec::id_to_key(1), b"{not json")
        })
        .unwrap();
    }

    let store = UserStore::open_path(&path, options()).unwrap();
    assert!(matches!(store.get_user(1), Err(CollectError::CorruptRecord(_))));
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_ids_resume_after_reopen() {
    let (_temp, path, store) = setup_temp_store();
    add(&store, "a@b.com", "");
    add(&store, "c@d.com", "");
    store.close().unwrap();

    let store = UserStore::open_path(&path, options()).unwrap();
    assert_eq!(add(&store, "e@f.com", ""), 3);
    assert_eq!(store.get_user(1).unwrap().email, "a@b.com");
    assert_eq!(store.get_user_id_by_email("c@d.com").unwrap(), 2);
}

#[test]
fn test_failed_add_leaves_gap() {
    let (_temp, path, store) = setup_temp_store();
    add(&store, "a@b.com", "");
    store.close().unwrap();

    // A value squatting on id 2's event bucket makes the next add fail after
    // it has taken an id
    {
        let db = Db::open(&path, options()).unwrap();
        db.update(|tx| {
            let mut users = tx.bucket_mut(USERS_BUCKET).unwrap();
            let mut events = users.bucket_mut(USER_EVENTS_BUCKET).unwrap();
            events.put(&usercollect::codec::id_to_key(2), b"squatter")
        })
        .unwrap();
    }

    let store = UserStore::open_path(&path, options()).unwrap();
    let result = store.add_user(User::new("c@d.com", ""));
    assert!(matches!(result, Err(CollectError::IncompatibleValue(_))));
    assert!(store.get_user_id_by_email("c@d.com").is_err());

    assert_eq!(add(&store, "c@d.com", ""), 3);
    assert!(matches!(store.get_user(2), Err(CollectError::NotFound(_))));
    assert_eq!(store.user_count().unwrap(), 2);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_adds_never_share_ids() {
    let (_temp, path, store) = setup_temp_store();
    let store = Arc::new(store);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..20)
                    .map(|i| {
                        store
                            .add_user(User::new(format!("t{}u{}@example.com", t, i), format!("{}-{}", t, i)))
                            .unwrap()
                    })
                    .collect::<Vec<u64>>()
            })
        })
        .collect();

    let ids: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let unique: HashSet<u64> = ids.iter().copied().collect();

    assert_eq!(ids.len(), 160);
    assert_eq!(unique.len(), 160);
    assert_eq!(store.user_count().unwrap(), 160);

    for id in &ids {
        let user = store.get_user(*id).unwrap();
        assert_eq!(store.get_user_id_by_email(&user.email).unwrap(), *id);
        assert_eq!(store.get_user_id_by_phone(&user.phone).unwrap(), *id);
    }

    store.close().unwrap();
    assert_eq!(nested_len(&path, EMAIL_INDEX_BUCKET), 160);
    assert_eq!(nested_len(&path, PHONE_INDEX_BUCKET), 160);
}

#[test]
fn test_readers_run_alongside_writers() {
    let (_temp, _path, store) = setup_temp_store();
    let store = Arc::new(store);
    add(&store, "seed@example.com", "");

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..50 {
                store
                    .add_user(User::new(format!("w{}@example.com", i), ""))
                    .unwrap();
            }
        })
    };

    let reader = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            let mut last = 0;
            for _ in 0..200 {
                let ids = store.get_user_ids_matching_email_prefix("").unwrap();
                assert!(ids.len() >= last);
                last = ids.len();
                assert_eq!(store.get_user(1).unwrap().email, "seed@example.com");
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(store.user_count().unwrap(), 51);
}
