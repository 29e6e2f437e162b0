//! Commit record definitions
//!
//! Defines the structure of a single frame in the store file.

use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{CollectError, Result};

/// Frame header size: TxId (8) + CRC (4) + Len (4) + HeaderCRC (4) = 20 bytes
pub const FRAME_HEADER_SIZE: u64 = 20;

/// Names of the buckets from the root down to (and including) a bucket
pub type BucketPath = Vec<Vec<u8>>;

/// One committed write transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Transaction id - strictly increasing across the log
    pub txid: u64,

    /// Timestamp (unix millis) when the transaction committed
    pub timestamp: u64,

    /// Mutations in the order they were made
    pub operations: Vec<Operation>,
}

/// Mutations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Create an empty bucket at `path` (parent must exist)
    CreateBucket { path: BucketPath },

    /// Put a key-value pair into the bucket at `bucket`
    Put {
        bucket: BucketPath,
        key: Vec<u8>,
        value: Vec<u8>,
    },

    /// Set the sequence counter of the bucket at `bucket`
    SetSequence { bucket: BucketPath, sequence: u64 },
}

impl CommitRecord {
    /// Create a record stamped with the current time
    pub fn new(txid: u64, operations: Vec<Operation>) -> Self {
        Self {
            txid,
            timestamp: now_millis(),
            operations,
        }
    }

    /// Encode as a complete frame (header + payload)
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        encode_frame(self.txid, &payload)
    }

    /// Decode a frame payload
    pub fn deserialize(payload: &[u8]) -> Result<Self> {
        bincode::deserialize(payload).map_err(|e| {
            CollectError::Corruption(format!("undecodable commit record: {}", e))
        })
    }
}

/// Build a frame around an already-encoded payload
pub fn encode_frame(txid: u64, payload: &[u8]) -> Result<Vec<u8>> {
    let len = frame_len(payload.len() as u64)?;

    let crc = frame_crc(txid, payload);

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE as usize + payload.len());
    frame.extend_from_slice(&encode_header(txid, crc, len));
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Stream a frame for `payload` into `writer` without buffering the payload.
///
/// Serializes twice: once into a checksum sink to learn the CRC and length,
/// then into the writer. Returns the number of bytes written.
pub fn write_frame<T, W>(writer: &mut W, txid: u64, payload: &T) -> Result<u64>
where
    T: Serialize,
    W: Write,
{
    let mut sink = ChecksumSink::new(txid);
    bincode::serialize_into(&mut sink, payload)?;
    let len = frame_len(sink.len)?;
    let crc = sink.hasher.finalize();

    writer.write_all(&encode_header(txid, crc, len))?;
    bincode::serialize_into(&mut *writer, payload)?;

    Ok(FRAME_HEADER_SIZE + sink.len)
}

/// Expected CRC of a frame
pub(crate) fn frame_crc(txid: u64, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&txid.to_le_bytes());
    hasher.update(payload);
    hasher.finalize()
}

/// Lay out a frame header; the trailing CRC covers the 16 bytes before it
fn encode_header(txid: u64, crc: u32, len: u32) -> [u8; FRAME_HEADER_SIZE as usize] {
    let mut header = [0u8; FRAME_HEADER_SIZE as usize];
    header[0..8].copy_from_slice(&txid.to_le_bytes());
    header[8..12].copy_from_slice(&crc.to_le_bytes());
    header[12..16].copy_from_slice(&len.to_le_bytes());
    let header_crc = crc32fast::hash(&header[0..16]);
    header[16..20].copy_from_slice(&header_crc.to_le_bytes());
    header
}

fn frame_len(len: u64) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        CollectError::Serialization(format!("frame payload too large: {} bytes", len))
    })
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Write sink that only hashes and counts
struct ChecksumSink {
    hasher: crc32fast::Hasher,
    len: u64,
}

impl ChecksumSink {
    fn new(txid: u64) -> Self {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&txid.to_le_bytes());
        Self { hasher, len: 0 }
    }
}

impl Write for ChecksumSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        self.len += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
