//! Commit Log Module
//!
//! The store file is an append-only log of committed write transactions.
//!
//! ## Responsibilities
//! - Append one frame per committed write transaction
//! - CRC32 checksums for corruption detection
//! - Transaction ids for ordering
//! - Crash recovery: replay on open, truncate torn tails
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Header (8 bytes)                        │
//! │ ┌──────────┬───────────┬─────────────┐  │
//! │ │Magic (4) │Version (2)│Reserved (2) │  │
//! │ └──────────┴───────────┴─────────────┘  │
//! ├─────────────────────────────────────────┤
//! │ Frame 1                                 │
//! │ ┌────────┬───────┬───────┬──────────┬──┐│
//! │ │TxId (8)│CRC (4)│Len (4)│HdrCRC (4)│..││
//! │ └────────┴───────┴───────┴──────────┴──┘│
//! ├─────────────────────────────────────────┤
//! │ Frame 2 ...                             │
//! └─────────────────────────────────────────┘
//! ```
//!
//! `..` is the bincode-encoded [`CommitRecord`]. `CRC` covers the TxId bytes
//! followed by the record; `HdrCRC` covers the 16 header bytes before it, so a
//! damaged length is caught before it is trusted.

mod entry;
mod reader;
mod recovery;
mod writer;

use std::io::{Read, Write};

use crate::error::{CollectError, Result};

pub use entry::{encode_frame, write_frame, BucketPath, CommitRecord, Operation, FRAME_HEADER_SIZE};
pub use reader::{FrameOutcome, LogReader};
pub use recovery::{LogRecovery, RecoveryResult};
pub use writer::LogWriter;

/// Magic bytes identifying a usercollect store file
pub const MAGIC: &[u8; 4] = b"UCKV";

/// Current store file format version
pub const VERSION: u16 = 1;

/// File header size: Magic (4) + Version (2) + Reserved (2) = 8 bytes
pub const FILE_HEADER_SIZE: u64 = 8;

/// Write the file header
pub fn write_file_header<W: Write>(writer: &mut W) -> Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_all(&VERSION.to_le_bytes())?;
    writer.write_all(&[0u8; 2])?;
    Ok(())
}

/// Read and validate the file header
pub fn read_file_header<R: Read>(reader: &mut R) -> Result<()> {
    let mut header = [0u8; FILE_HEADER_SIZE as usize];
    reader.read_exact(&mut header)?;

    if &header[0..4] != MAGIC {
        return Err(CollectError::Corruption(format!(
            "invalid store magic: expected UCKV, got {:?}",
            &header[0..4]
        )));
    }

    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != VERSION {
        return Err(CollectError::Corruption(format!(
            "unsupported store version: {}",
            version
        )));
    }

    Ok(())
}
