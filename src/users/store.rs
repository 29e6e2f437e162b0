//! User Store
//!
//! Lifecycle of the store handle and the record operations over the primary
//! bucket and its two indexes.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::codec::{id_to_key, key_to_id, ID_KEY_LEN};
use crate::config::DbOptions;
use crate::error::{CollectError, Result};
use crate::storage::{BucketMut, Db};

use super::schema::{
    self, EMAIL_INDEX_BUCKET, PHONE_INDEX_BUCKET, USERS_BUCKET, USER_EVENTS_BUCKET,
};
use super::User;

/// Storage core of the user collection service
///
/// ## Concurrency
/// - `handle`: taken for writing only by `open`/`close`; every operation
///   clones the `Arc<Db>` under a brief read lock and then relies on the
///   engine's own transactions
/// - Operations never hold `handle` while they run, so `close` only waits
///   for other lifecycle transitions
pub struct UserStore {
    /// Engine options used by `open`
    options: DbOptions,

    /// `Some` while the store is open
    handle: RwLock<Option<Arc<Db>>>,
}

impl UserStore {
    /// Create a closed store
    pub fn new(options: DbOptions) -> Self {
        Self {
            options,
            handle: RwLock::new(None),
        }
    }

    /// Create a store, open `path` and initialise the schema
    pub fn open_path(path: impl AsRef<Path>, options: DbOptions) -> Result<Self> {
        let store = Self::new(options);
        store.open(path)?;
        store.init()?;
        Ok(store)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the store file at `path`, waiting up to the lock timeout
    pub fn open(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut handle = self.handle.write();
        if handle.is_some() {
            return Err(CollectError::AlreadyOpen);
        }

        let db = Db::open(path, self.options)?;
        *handle = Some(Arc::new(db));
        Ok(())
    }

    /// Open a store file that already exists and has been initialised
    ///
    /// For offline tools: a missing file is not created, and a file without
    /// the schema is closed again. Both are `NotFound`.
    pub fn open_existing(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CollectError::NotFound(format!(
                "no store file at {}",
                path.display()
            )));
        }

        self.open(path)?;
        let initialised = self
            .db()
            .and_then(|db| db.view(|tx| Ok(tx.bucket(USERS_BUCKET).is_some())));
        match initialised {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.close()?;
                Err(CollectError::NotFound(format!(
                    "store {} has not been initialised",
                    path.display()
                )))
            }
            Err(e) => {
                let _ = self.close();
                Err(e)
            }
        }
    }

    /// Create the buckets if they do not exist
    ///
    /// Must run once after `open` and before any record operation.
    pub fn init(&self) -> Result<()> {
        let db = self.db()?;
        schema::initialize(&db)?;
        tracing::info!("Initialised store schema at {}", db.path().display());
        Ok(())
    }

    /// Sync and release the store file
    ///
    /// The file lock is released once in-flight operations holding the handle
    /// finish.
    pub fn close(&self) -> Result<()> {
        let db = self.handle.write().take().ok_or(CollectError::NotOpen)?;
        db.sync()?;
        tracing::info!("Closed store {}", db.path().display());
        Ok(())
    }

    /// True between a successful `open` and `close`
    pub fn is_open(&self) -> bool {
        self.handle.read().is_some()
    }

    pub(crate) fn db(&self) -> Result<Arc<Db>> {
        self.handle.read().clone().ok_or(CollectError::NotOpen)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store a new user and return its id
    ///
    /// The record, its event bucket and its index entries are written in one
    /// transaction. Ids come from the `users` bucket sequence; an id handed to
    /// a transaction that fails is never reissued.
    pub fn add_user(&self, candidate: User) -> Result<u64> {
        if !candidate.is_valid() {
            return Err(CollectError::Validation(format!(
                "invalid email address: {:?}",
                candidate.email
            )));
        }

        let db = self.db()?;
        let id = db.update(move |tx| {
            let mut users = tx
                .bucket_mut(USERS_BUCKET)
                .ok_or_else(|| missing_bucket(USERS_BUCKET))?;

            ensure_unindexed(&users, EMAIL_INDEX_BUCKET, "email", &candidate.email)?;
            if !candidate.phone.is_empty() {
                ensure_unindexed(&users, PHONE_INDEX_BUCKET, "phone", &candidate.phone)?;
            }

            let id = users.next_sequence()?;
            let user = User { id, ..candidate };
            let key = id_to_key(id);

            let record = serde_json::to_vec(&user)
                .map_err(|e| CollectError::Serialization(e.to_string()))?;
            users.put(&key, &record)?;

            users
                .bucket_mut(USER_EVENTS_BUCKET)
                .ok_or_else(|| missing_bucket(USER_EVENTS_BUCKET))?
                .create_bucket(&key)?;

            users
                .bucket_mut(EMAIL_INDEX_BUCKET)
                .ok_or_else(|| missing_bucket(EMAIL_INDEX_BUCKET))?
                .put(user.email.as_bytes(), &key)?;

            if !user.phone.is_empty() {
                users
                    .bucket_mut(PHONE_INDEX_BUCKET)
                    .ok_or_else(|| missing_bucket(PHONE_INDEX_BUCKET))?
                    .put(user.phone.as_bytes(), &key)?;
            }

            Ok(id)
        })?;

        tracing::info!("Successfully added user data to store using id: {}", id);
        Ok(id)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get the user with `id`
    pub fn get_user(&self, id: u64) -> Result<User> {
        let db = self.db()?;
        db.view(|tx| {
            let raw = tx
                .bucket(USERS_BUCKET)
                .and_then(|users| users.get(&id_to_key(id)))
                .ok_or_else(|| {
                    CollectError::NotFound(format!("could not find user for ID: {}", id))
                })?;

            serde_json::from_slice(raw).map_err(|e| {
                CollectError::CorruptRecord(format!("user {} does not decode: {}", id, e))
            })
        })
    }

    /// Exact lookup of the id registered for `email`
    pub fn get_user_id_by_email(&self, email: &str) -> Result<u64> {
        self.lookup_index(EMAIL_INDEX_BUCKET, email)
            .map_err(|e| not_found_for(e, "email", email))
    }

    /// Exact lookup of the id registered for `phone`
    pub fn get_user_id_by_phone(&self, phone: &str) -> Result<u64> {
        self.lookup_index(PHONE_INDEX_BUCKET, phone)
            .map_err(|e| not_found_for(e, "phone", phone))
    }

    /// Ids of every user whose email starts with `prefix`, in ascending
    /// email order.
    ///
    /// Plain byte-prefix matching: callers wanting case-insensitive search
    /// must normalise first. An empty prefix matches everyone.
    pub fn get_user_ids_matching_email_prefix(&self, prefix: &str) -> Result<Vec<u64>> {
        let db = self.db()?;
        let ids = db.view(|tx| {
            let Some(index) = tx
                .bucket(USERS_BUCKET)
                .and_then(|users| users.bucket(EMAIL_INDEX_BUCKET))
            else {
                tracing::warn!("Email index is missing; has the store been initialised?");
                return Ok(Vec::new());
            };

            let prefix = prefix.as_bytes();
            let mut ids = Vec::new();
            let mut cursor = index.cursor();
            let mut entry = cursor.seek(prefix);
            while let Some((key, value)) = entry {
                if !key.starts_with(prefix) {
                    break;
                }
                if let Some(value) = value {
                    tracing::debug!("key={}, value={:?}", String::from_utf8_lossy(key), value);
                    ids.push(key_to_id(value)?);
                }
                entry = cursor.next();
            }
            Ok(ids)
        })?;

        if ids.is_empty() {
            return Err(CollectError::NotFound(format!(
                "could not find user ID for email: {}",
                prefix
            )));
        }
        Ok(ids)
    }

    /// Number of stored user records
    pub fn user_count(&self) -> Result<u64> {
        let db = self.db()?;
        db.view(|tx| {
            let users = tx
                .bucket(USERS_BUCKET)
                .ok_or_else(|| missing_bucket(USERS_BUCKET))?;
            Ok(users
                .cursor()
                .filter(|(key, value)| value.is_some() && key.len() == ID_KEY_LEN)
                .count() as u64)
        })
    }

    fn lookup_index(&self, index: &[u8], value: &str) -> Result<u64> {
        let db = self.db()?;
        db.view(|tx| {
            let raw = tx
                .bucket(USERS_BUCKET)
                .and_then(|users| users.bucket(index))
                .and_then(|bucket| bucket.get(value.as_bytes()))
                .ok_or_else(|| CollectError::NotFound(String::new()))?;
            key_to_id(raw)
        })
    }
}

/// Refuse a value that already maps to another user
fn ensure_unindexed(users: &BucketMut<'_>, index: &[u8], field: &str, value: &str) -> Result<()> {
    let bucket = users.bucket(index).ok_or_else(|| missing_bucket(index))?;
    match bucket.get(value.as_bytes()) {
        Some(existing) => Err(CollectError::Validation(format!(
            "{} {:?} is already registered to user {}",
            field,
            value,
            key_to_id(existing)?
        ))),
        None => Ok(()),
    }
}

fn missing_bucket(name: &[u8]) -> CollectError {
    CollectError::BucketNotFound(String::from_utf8_lossy(name).into_owned())
}

fn not_found_for(err: CollectError, field: &str, value: &str) -> CollectError {
    match err {
        CollectError::NotFound(_) => {
            CollectError::NotFound(format!("could not find user ID for {}: {}", field, value))
        }
        other => other,
    }
}
