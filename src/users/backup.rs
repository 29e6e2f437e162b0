//! Snapshot/Backup
//!
//! ```text
//! snapshot() ──► Backup ──► size()      (Content-Length)
//!                       └─► write_to()  (body)
//! ```
//!
//! Both calls on one `Backup` see the same read transaction, so the length
//! announced up front always matches the bytes written.

use std::io::Write;

use crate::error::Result;
use crate::storage::ReadTx;

use super::UserStore;

/// A pinned, point-in-time view of the whole store
#[derive(Clone)]
pub struct Backup {
    tx: ReadTx,
}

impl Backup {
    /// Transaction id the backup reflects
    pub fn txid(&self) -> u64 {
        self.tx.txid()
    }

    /// Exact number of bytes `write_to` produces
    pub fn size(&self) -> Result<u64> {
        self.tx.size()
    }

    /// Write the snapshot as a store file that opens on its own
    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<u64> {
        let written = self.tx.write_to(sink)?;
        tracing::info!("Wrote backup of txid {} ({} bytes)", self.txid(), written);
        Ok(written)
    }
}

impl UserStore {
    /// Pin the current state for a later `size`/`write_to` pair
    pub fn snapshot(&self) -> Result<Backup> {
        Ok(Backup {
            tx: self.db()?.begin_read(),
        })
    }

    /// Size of a backup taken now
    ///
    /// Advisory: a commit between this call and `backup` changes the length.
    /// Use [`UserStore::snapshot`] when the two must agree.
    pub fn size(&self) -> Result<u64> {
        self.snapshot()?.size()
    }

    /// Write a consistent copy of the store to `sink`
    pub fn backup<W: Write>(&self, sink: &mut W) -> Result<u64> {
        self.snapshot()?.write_to(sink)
    }
}
