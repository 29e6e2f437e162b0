//! Bucket Tree Module
//!
//! In-memory state of the store: a tree of named buckets.
//!
//! ## Responsibilities
//! - Ordered keys per bucket (cursors and prefix scans)
//! - Nested buckets and per-bucket sequence counters
//! - Cheap snapshots for readers
//! - Replaying commit records
//!
//! ## Data Structure Choice
//! Each bucket is an `im::OrdMap` and nested buckets sit behind `Arc`:
//! - Cloning a bucket is O(1); a put copies only the map nodes on its path
//! - A writer calls `Arc::make_mut` only on the buckets it touches
//! - Readers keep the old `Arc` alive for as long as they need it
//! - Keys and values are `Bytes`, so copied map nodes never copy key or value bytes

mod bucket;

pub use bucket::{Bucket, Node};
pub(crate) use bucket::display_key;
