//! Bucket layout
//!
//! ```text
//! users                      id_to_key(id) -> JSON user record
//! ├── userevents             one empty bucket per user, named id_to_key(id)
//! ├── emailtouserid          email bytes -> id_to_key(id)
//! └── phonenotouserid        phone bytes -> id_to_key(id)
//! ```
//!
//! The `users` bucket's sequence counter issues user ids.

use crate::error::Result;
use crate::storage::Db;

/// Primary records, keyed by 8-byte big-endian id
pub const USERS_BUCKET: &[u8] = b"users";

/// Parent of the per-user event buckets
pub const USER_EVENTS_BUCKET: &[u8] = b"userevents";

/// Email -> id index
pub const EMAIL_INDEX_BUCKET: &[u8] = b"emailtouserid";

/// Phone -> id index (sparse)
pub const PHONE_INDEX_BUCKET: &[u8] = b"phonenotouserid";

/// Create any missing buckets in one write transaction.
///
/// Safe to call on every start; existing buckets are left untouched.
pub fn initialize(db: &Db) -> Result<()> {
    db.update(|tx| {
        let mut users = tx.create_bucket_if_not_exists(USERS_BUCKET)?;
        users.create_bucket_if_not_exists(USER_EVENTS_BUCKET)?;
        users.create_bucket_if_not_exists(EMAIL_INDEX_BUCKET)?;
        users.create_bucket_if_not_exists(PHONE_INDEX_BUCKET)?;
        Ok(())
    })
}
