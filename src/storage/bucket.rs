//! Bucket handles
//!
//! Read-only and read-write views of a bucket inside a transaction.

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::{CollectError, Result};
use crate::tree::{display_key, Bucket};
use crate::wal::{BucketPath, Operation};

use super::Cursor;

/// Read-only view of a bucket
#[derive(Clone, Copy)]
pub struct BucketRef<'a> {
    node: &'a Bucket,
}

impl<'a> BucketRef<'a> {
    pub(crate) fn new(node: &'a Bucket) -> Self {
        Self { node }
    }

    /// Get a value by key; nested buckets return `None`
    pub fn get(&self, key: &[u8]) -> Option<&'a [u8]> {
        self.node.value(key).map(|value| &value[..])
    }

    /// Get a nested bucket
    pub fn bucket(&self, name: &[u8]) -> Option<BucketRef<'a>> {
        self.node.bucket(name).map(BucketRef::new)
    }

    /// Create a cursor over this bucket
    pub fn cursor(&self) -> Cursor<'a> {
        Cursor::new(self.node)
    }

    /// Current sequence value
    pub fn sequence(&self) -> u64 {
        self.node.sequence()
    }

    /// Number of entries (values and nested buckets)
    pub fn len(&self) -> usize {
        self.node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node.is_empty()
    }
}

/// Mutations and sequence bookkeeping of one write transaction
#[derive(Debug, Default)]
pub(crate) struct TxLog {
    /// Operations to be appended on commit
    pub(crate) operations: Vec<Operation>,

    /// Sequence values consumed by earlier failed transactions
    pub(crate) floors: HashMap<BucketPath, u64>,

    /// Highest sequence value handed out per bucket in this transaction
    pub(crate) issued: HashMap<BucketPath, u64>,
}

impl TxLog {
    pub(crate) fn new(floors: HashMap<BucketPath, u64>) -> Self {
        Self {
            operations: Vec::new(),
            floors,
            issued: HashMap::new(),
        }
    }
}

/// Read-write view of a bucket
pub struct BucketMut<'tx> {
    node: &'tx mut Bucket,
    path: BucketPath,
    log: &'tx mut TxLog,
}

impl<'tx> BucketMut<'tx> {
    /// Get a value by key; nested buckets return `None`
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.node.value(key).map(|value| &value[..])
    }

    /// Get a nested bucket for reading
    pub fn bucket(&self, name: &[u8]) -> Option<BucketRef<'_>> {
        self.node.bucket(name).map(BucketRef::new)
    }

    /// Create a cursor over this bucket
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor::new(self.node)
    }

    /// Current sequence value
    pub fn sequence(&self) -> u64 {
        self.node.sequence()
    }

    /// Put a key-value pair
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.node.put(key, Bytes::copy_from_slice(value))?;
        self.log.operations.push(Operation::Put {
            bucket: self.path.clone(),
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    /// Get a nested bucket for writing
    pub fn bucket_mut(&mut self, name: &[u8]) -> Option<BucketMut<'_>> {
        child(self.node, &self.path, self.log, name)
    }

    /// Create a nested bucket; fails if `name` already exists
    pub fn create_bucket(&mut self, name: &[u8]) -> Result<BucketMut<'_>> {
        create_child(self.node, &self.path, self.log, name)
    }

    /// Create a nested bucket unless it already exists
    pub fn create_bucket_if_not_exists(&mut self, name: &[u8]) -> Result<BucketMut<'_>> {
        if self.node.bucket(name).is_some() {
            return child(self.node, &self.path, self.log, name)
                .ok_or_else(|| CollectError::BucketNotFound(display_key(name)));
        }
        create_child(self.node, &self.path, self.log, name)
    }

    /// Return the next value of this bucket's sequence counter.
    ///
    /// The value stays consumed even if the transaction later fails.
    pub fn next_sequence(&mut self) -> Result<u64> {
        let floor = self.log.floors.get(&self.path).copied().unwrap_or(0);
        let next = self
            .node
            .sequence()
            .max(floor)
            .checked_add(1)
            .ok_or_else(|| CollectError::StorageUnavailable("sequence exhausted".to_string()))?;

        self.node.set_sequence(next);
        self.log.issued.insert(self.path.clone(), next);
        self.log.operations.push(Operation::SetSequence {
            bucket: self.path.clone(),
            sequence: next,
        });
        Ok(next)
    }
}

/// Open the nested bucket `name` of `node` for writing
pub(crate) fn child<'b>(
    node: &'b mut Bucket,
    path: &BucketPath,
    log: &'b mut TxLog,
    name: &[u8],
) -> Option<BucketMut<'b>> {
    let node = node.bucket_mut(name)?;
    Some(BucketMut {
        node,
        path: child_path(path, name),
        log,
    })
}

/// Create the nested bucket `name` of `node` and open it for writing
pub(crate) fn create_child<'b>(
    node: &'b mut Bucket,
    path: &BucketPath,
    log: &'b mut TxLog,
    name: &[u8],
) -> Result<BucketMut<'b>> {
    let node = node.create_bucket(name)?;
    let path = child_path(path, name);
    log.operations.push(Operation::CreateBucket { path: path.clone() });
    Ok(BucketMut { node, path, log })
}

fn child_path(path: &BucketPath, name: &[u8]) -> BucketPath {
    let mut child = path.clone();
    child.push(name.to_vec());
    child
}
