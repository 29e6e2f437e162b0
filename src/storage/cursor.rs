//! Bucket Cursor
//!
//! Ordered, forward-only traversal of a bucket's entries.

use crate::tree::{Bucket, Node};

type Entries<'a> = Box<dyn Iterator<Item = (&'a [u8], &'a Node)> + 'a>;

/// Forward cursor over a bucket
///
/// Yields `(key, Some(value))` for values and `(key, None)` for nested
/// buckets, in ascending key order. Without a `seek`, iteration starts at the
/// first key.
pub struct Cursor<'a> {
    bucket: &'a Bucket,
    range: Option<Entries<'a>>,
}

/// One cursor position: key and value (`None` for a nested bucket)
pub type CursorEntry<'a> = (&'a [u8], Option<&'a [u8]>);

impl<'a> Cursor<'a> {
    pub(crate) fn new(bucket: &'a Bucket) -> Self {
        Self {
            bucket,
            range: None,
        }
    }

    /// Move to the first entry
    pub fn first(&mut self) -> Option<CursorEntry<'a>> {
        self.range = Some(Box::new(self.bucket.iter()));
        self.next()
    }

    /// Move to the first entry whose key is >= `key`
    pub fn seek(&mut self, key: &[u8]) -> Option<CursorEntry<'a>> {
        self.range = Some(Box::new(self.bucket.range_from(key)));
        self.next()
    }
}

impl<'a> Iterator for Cursor<'a> {
    type Item = CursorEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let bucket = self.bucket;
        let range = self
            .range
            .get_or_insert_with(|| Box::new(bucket.iter()));
        range.next().map(|(key, node)| match node {
            Node::Value(value) => (key, Some(&value[..])),
            Node::Bucket(_) => (key, None),
        })
    }
}
