//! Commit Log Reader
//!
//! Reads frames sequentially from the store file.

use std::io::Read;

use crate::error::{CollectError, Result};

use super::entry::frame_crc;
use super::{CommitRecord, FRAME_HEADER_SIZE};

/// Result of reading one frame
#[derive(Debug)]
pub enum FrameOutcome {
    /// A complete, checksummed frame
    Frame {
        record: CommitRecord,
        /// File offset just past this frame
        end_offset: u64,
    },

    /// Clean end of log
    End,

    /// The log ends in a partially written frame starting at `offset`
    Torn { offset: u64, reason: String },
}

/// Reads frames from a log of known length
pub struct LogReader<R: Read> {
    reader: R,
    /// Offset of the next unread frame
    offset: u64,
    /// Total length of the log
    len: u64,
}

impl<R: Read> LogReader<R> {
    /// Create a reader positioned at `offset` (just after the file header)
    pub fn new(reader: R, offset: u64, len: u64) -> Self {
        Self {
            reader,
            offset,
            len,
        }
    }

    /// Offset of the next unread frame
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next frame
    ///
    /// Only the final frame can be torn: a short header, a payload running
    /// past the end of the log, or a payload checksum mismatch that ends
    /// exactly at the end of the log. A complete header that fails its own
    /// checksum is corruption wherever it sits.
    pub fn next_frame(&mut self) -> Result<FrameOutcome> {
        if self.offset >= self.len {
            return Ok(FrameOutcome::End);
        }

        let remaining = self.len - self.offset;
        if remaining < FRAME_HEADER_SIZE {
            return Ok(self.torn("incomplete frame header"));
        }

        let mut header = [0u8; FRAME_HEADER_SIZE as usize];
        self.reader.read_exact(&mut header)?;

        let txid = u64::from_le_bytes(header[0..8].try_into().unwrap_or_default());
        let crc = u32::from_le_bytes(header[8..12].try_into().unwrap_or_default());
        let payload_len = u32::from_le_bytes(header[12..16].try_into().unwrap_or_default()) as u64;
        let header_crc = u32::from_le_bytes(header[16..20].try_into().unwrap_or_default());

        // An appended frame lands as a prefix, so a complete header is never torn
        if crc32fast::hash(&header[0..16]) != header_crc {
            return Err(CollectError::Corruption(format!(
                "header checksum mismatch in frame at offset {}",
                self.offset
            )));
        }

        if remaining - FRAME_HEADER_SIZE < payload_len {
            return Ok(self.torn("incomplete frame payload"));
        }

        let mut payload = vec![0u8; payload_len as usize];
        self.reader.read_exact(&mut payload)?;

        let end_offset = self.offset + FRAME_HEADER_SIZE + payload_len;

        if frame_crc(txid, &payload) != crc {
            if end_offset == self.len {
                return Ok(self.torn("checksum mismatch in final frame"));
            }
            return Err(CollectError::Corruption(format!(
                "checksum mismatch in frame at offset {}",
                self.offset
            )));
        }

        let record = CommitRecord::deserialize(&payload)?;
        if record.txid != txid {
            return Err(CollectError::Corruption(format!(
                "frame at offset {} claims txid {} but carries {}",
                self.offset, txid, record.txid
            )));
        }

        self.offset = end_offset;
        Ok(FrameOutcome::Frame { record, end_offset })
    }

    fn torn(&self, reason: &str) -> FrameOutcome {
        FrameOutcome::Torn {
            offset: self.offset,
            reason: reason.to_string(),
        }
    }
}
