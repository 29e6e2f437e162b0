//! Storage Module
//!
//! Embedded single-file transactional key-value store.
//!
//! ## Responsibilities
//! - Named, nested buckets with ordered keys
//! - Per-bucket sequence counters
//! - Single writer, many snapshot-isolated readers
//! - Exclusive file lock with a bounded wait
//! - Consistent export of a snapshot as a fresh store file
//!
//! ## Usage
//! ```no_run
//! use usercollect::config::DbOptions;
//! use usercollect::storage::Db;
//!
//! # fn main() -> usercollect::Result<()> {
//! let db = Db::open("./example.db", DbOptions::default())?;
//! db.update(|tx| {
//!     let mut bucket = tx.create_bucket_if_not_exists(b"widgets")?;
//!     bucket.put(b"a", b"1")
//! })?;
//! let value = db.view(|tx| {
//!     Ok(tx.bucket(b"widgets").and_then(|b| b.get(b"a")).map(|v| v.to_vec()))
//! })?;
//! assert_eq!(value, Some(b"1".to_vec()));
//! # Ok(())
//! # }
//! ```

mod bucket;
mod cursor;
mod db;
mod lock;
mod snapshot;
mod tx;

pub use bucket::{BucketMut, BucketRef};
pub use cursor::{Cursor, CursorEntry};
pub use db::Db;
pub use lock::FileLock;
pub use tx::{ReadTx, WriteTx};
