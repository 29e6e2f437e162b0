//! Snapshot export
//!
//! Serializes a read transaction's view as a complete store file: the file
//! header followed by one frame whose operations rebuild the whole tree.
//! The frame payload is encoded straight from the tree through borrowed
//! operations, so exporting never copies keys or values.

use std::io::{BufWriter, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::Result;
use crate::tree::{Bucket, Node};
use crate::wal::{write_file_header, write_frame, FILE_HEADER_SIZE, FRAME_HEADER_SIZE};

use super::ReadTx;

/// Borrowed twin of `CommitRecord`; encodes to identical bytes
#[derive(Serialize)]
struct SnapshotRecord<'a> {
    txid: u64,
    timestamp: u64,
    operations: Vec<OperationRef<'a>>,
}

/// Borrowed twin of `Operation`; variant order must match
#[derive(Serialize)]
enum OperationRef<'a> {
    CreateBucket {
        path: Vec<&'a [u8]>,
    },
    Put {
        bucket: Vec<&'a [u8]>,
        key: &'a [u8],
        value: &'a [u8],
    },
    SetSequence {
        bucket: Vec<&'a [u8]>,
        sequence: u64,
    },
}

impl ReadTx {
    /// Exact number of bytes `write_to` produces for this snapshot
    pub fn size(&self) -> Result<u64> {
        let record = self.snapshot_record();
        Ok(FILE_HEADER_SIZE + FRAME_HEADER_SIZE + bincode::serialized_size(&record)?)
    }

    /// Write this snapshot to `writer` as an independently openable store file.
    ///
    /// Returns the number of bytes written. A failure leaves a truncated
    /// stream that must be discarded.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<u64> {
        let record = self.snapshot_record();
        let mut writer = BufWriter::new(writer);

        write_file_header(&mut writer)?;
        let written = write_frame(&mut writer, record.txid, &record)?;
        writer.flush()?;

        Ok(FILE_HEADER_SIZE + written)
    }

    fn snapshot_record(&self) -> SnapshotRecord<'_> {
        let snapshot = self.snapshot();
        let mut operations = Vec::new();
        collect_operations(&snapshot.root, &mut Vec::new(), &mut operations);

        SnapshotRecord {
            txid: snapshot.txid,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
            operations,
        }
    }
}

/// Emit operations that rebuild `bucket`'s contents, parents before children
fn collect_operations<'a>(
    bucket: &'a Bucket,
    path: &mut Vec<&'a [u8]>,
    out: &mut Vec<OperationRef<'a>>,
) {
    if bucket.sequence() > 0 {
        out.push(OperationRef::SetSequence {
            bucket: path.clone(),
            sequence: bucket.sequence(),
        });
    }

    for (key, node) in bucket.iter() {
        match node {
            Node::Value(value) => out.push(OperationRef::Put {
                bucket: path.clone(),
                key,
                value: &value[..],
            }),
            Node::Bucket(child) => {
                path.push(key);
                out.push(OperationRef::CreateBucket { path: path.clone() });
                collect_operations(child, path, out);
                path.pop();
            }
        }
    }
}
