//! Transactions
//!
//! Read transactions pin a snapshot; write transactions build a private copy
//! of the tree plus the operations to append on commit.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CollectError, Result};
use crate::tree::{display_key, Bucket};
use crate::wal::{BucketPath, Operation};

use super::bucket::{child, create_child, TxLog};
use super::{BucketMut, BucketRef};

/// Immutable, published state of the store
#[derive(Debug, Default)]
pub(crate) struct Snapshot {
    /// Transaction id of the commit that produced this state
    pub(crate) txid: u64,

    /// Root bucket (holds only buckets)
    pub(crate) root: Bucket,
}

/// Read-only transaction
///
/// Observes the state as of the moment it began, regardless of later commits.
#[derive(Clone)]
pub struct ReadTx {
    snapshot: Arc<Snapshot>,
}

impl ReadTx {
    pub(crate) fn new(snapshot: Arc<Snapshot>) -> Self {
        Self { snapshot }
    }

    /// Transaction id of the snapshot being read
    pub fn txid(&self) -> u64 {
        self.snapshot.txid
    }

    /// Get a top-level bucket
    pub fn bucket(&self, name: &[u8]) -> Option<BucketRef<'_>> {
        self.snapshot.root.bucket(name).map(BucketRef::new)
    }

    pub(crate) fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

/// Read-write transaction
///
/// Only one exists at a time; see [`super::Db::update`].
pub struct WriteTx {
    root: Bucket,
    log: TxLog,
}

impl WriteTx {
    pub(crate) fn new(root: Bucket, floors: HashMap<BucketPath, u64>) -> Self {
        Self {
            root,
            log: TxLog::new(floors),
        }
    }

    /// Get a top-level bucket for reading
    pub fn bucket(&self, name: &[u8]) -> Option<BucketRef<'_>> {
        self.root.bucket(name).map(BucketRef::new)
    }

    /// Get a top-level bucket for writing
    pub fn bucket_mut(&mut self, name: &[u8]) -> Option<BucketMut<'_>> {
        child(&mut self.root, &Vec::new(), &mut self.log, name)
    }

    /// Create a top-level bucket; fails if it already exists
    pub fn create_bucket(&mut self, name: &[u8]) -> Result<BucketMut<'_>> {
        create_child(&mut self.root, &Vec::new(), &mut self.log, name)
    }

    /// Create a top-level bucket unless it already exists
    pub fn create_bucket_if_not_exists(&mut self, name: &[u8]) -> Result<BucketMut<'_>> {
        if self.root.bucket(name).is_some() {
            return self
                .bucket_mut(name)
                .ok_or_else(|| CollectError::BucketNotFound(display_key(name)));
        }
        self.create_bucket(name)
    }

    /// Split into the new root, the operations to log, and the sequence
    /// values handed out
    pub(crate) fn into_parts(self) -> (Bucket, Vec<Operation>, HashMap<BucketPath, u64>) {
        (self.root, self.log.operations, self.log.issued)
    }
}
