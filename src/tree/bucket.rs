//! Bucket implementation
//!
//! Copy-on-write bucket node with ordered entries.
//!
//! Entries live in a persistent ordered map: cloning a bucket is O(1) and a
//! write copies only the O(log n) path to the entry it changes, so the
//! snapshot a writer starts from stays intact for readers.

use std::ops::Bound;
use std::sync::Arc;

use bytes::Bytes;
use im::OrdMap;

use crate::error::{CollectError, Result};
use crate::wal::{CommitRecord, Operation};

/// Entry stored in a bucket
#[derive(Debug, Clone)]
pub enum Node {
    /// A plain value
    Value(Bytes),

    /// A nested bucket
    Bucket(Arc<Bucket>),
}

/// A named key-value container; the root bucket holds only buckets
#[derive(Debug, Clone, Default)]
pub struct Bucket {
    /// Last value handed out by the sequence counter
    sequence: u64,

    /// Entries in key order
    entries: OrdMap<Bytes, Node>,
}

impl Bucket {
    /// Create a new empty bucket
    pub fn new() -> Self {
        Self::default()
    }

    /// Current sequence value
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Set the sequence value
    pub fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    /// Number of entries (values and nested buckets)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up any entry
    pub fn node(&self, key: &[u8]) -> Option<&Node> {
        self.entries.get(key)
    }

    /// Look up a value (nested buckets are not values)
    pub fn value(&self, key: &[u8]) -> Option<&Bytes> {
        match self.entries.get(key) {
            Some(Node::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Look up a nested bucket
    pub fn bucket(&self, name: &[u8]) -> Option<&Bucket> {
        match self.entries.get(name) {
            Some(Node::Bucket(bucket)) => Some(bucket.as_ref()),
            _ => None,
        }
    }

    /// Look up a nested bucket for writing, detaching it from any snapshot
    /// that still shares it
    pub fn bucket_mut(&mut self, name: &[u8]) -> Option<&mut Bucket> {
        match self.entries.get_mut(name) {
            Some(Node::Bucket(bucket)) => Some(Arc::make_mut(bucket)),
            _ => None,
        }
    }

    /// Create an empty nested bucket
    pub fn create_bucket(&mut self, name: &[u8]) -> Result<&mut Bucket> {
        if name.is_empty() {
            return Err(CollectError::Validation(
                "bucket name must not be empty".to_string(),
            ));
        }

        match self.entries.get(name) {
            Some(Node::Bucket(_)) => return Err(CollectError::BucketExists(display_key(name))),
            Some(Node::Value(_)) => {
                return Err(CollectError::IncompatibleValue(format!(
                    "{} holds a value, not a bucket",
                    display_key(name)
                )))
            }
            None => {}
        }

        self.entries.insert(
            Bytes::copy_from_slice(name),
            Node::Bucket(Arc::new(Bucket::new())),
        );
        self.bucket_mut(name)
            .ok_or_else(|| CollectError::BucketNotFound(display_key(name)))
    }

    /// Put a value; refuses to overwrite a nested bucket
    pub fn put(&mut self, key: &[u8], value: Bytes) -> Result<()> {
        if key.is_empty() {
            return Err(CollectError::Validation("key must not be empty".to_string()));
        }
        if let Some(Node::Bucket(_)) = self.entries.get(key) {
            return Err(CollectError::IncompatibleValue(format!(
                "{} is a bucket",
                display_key(key)
            )));
        }
        self.entries.insert(Bytes::copy_from_slice(key), Node::Value(value));
        Ok(())
    }

    /// Iterate over all entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &Node)> + '_ {
        self.entries.iter().map(|(key, node)| (&key[..], node))
    }

    /// Iterate over entries with key >= `start`
    pub fn range_from<'a>(
        &'a self,
        start: &[u8],
    ) -> impl Iterator<Item = (&'a [u8], &'a Node)> + 'a {
        self.entries
            .range::<_, [u8]>((Bound::Included(start), Bound::Unbounded))
            .map(|(key, node)| (&key[..], node))
    }

    /// Walk `path` from this bucket down, detaching every bucket on the way
    pub fn descend_mut(&mut self, path: &[Vec<u8>]) -> Result<&mut Bucket> {
        let mut current = self;
        for name in path {
            current = current
                .bucket_mut(name)
                .ok_or_else(|| CollectError::BucketNotFound(display_key(name)))?;
        }
        Ok(current)
    }

    /// Replay a committed transaction against this (root) bucket
    pub fn apply_record(&mut self, record: CommitRecord) -> Result<()> {
        let txid = record.txid;
        for operation in record.operations {
            self.apply(operation).map_err(|e| {
                CollectError::Corruption(format!("txid {} does not replay: {}", txid, e))
            })?;
        }
        Ok(())
    }

    /// Replay a single operation
    pub fn apply(&mut self, operation: Operation) -> Result<()> {
        match operation {
            Operation::CreateBucket { path } => {
                let (name, parent) = path.split_last().ok_or_else(|| {
                    CollectError::Validation("bucket path must not be empty".to_string())
                })?;
                self.descend_mut(parent)?.create_bucket(name)?;
            }
            Operation::Put { bucket, key, value } => {
                self.descend_mut(&bucket)?.put(&key, Bytes::from(value))?;
            }
            Operation::SetSequence { bucket, sequence } => {
                self.descend_mut(&bucket)?.set_sequence(sequence);
            }
        }
        Ok(())
    }
}

/// Render a key for error messages
pub(crate) fn display_key(key: &[u8]) -> String {
    match std::str::from_utf8(key) {
        Ok(s) if !s.chars().any(char::is_control) => s.to_string(),
        _ => format!("0x{}", key.iter().map(|b| format!("{:02x}", b)).collect::<String>()),
    }
}
