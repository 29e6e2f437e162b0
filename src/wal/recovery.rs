//! Commit Log Recovery
//!
//! Replays the store file on open and removes partially written frames.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{CollectError, Result};

use super::{
    read_file_header, write_file_header, CommitRecord, FrameOutcome, LogReader, FILE_HEADER_SIZE,
};

/// Handles log replay after open or crash
pub struct LogRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of frames successfully replayed
    pub frames_recovered: u64,

    /// Last valid transaction id
    pub last_txid: u64,

    /// Whether a torn tail was found (and removed, when recovering)
    pub was_truncated: bool,

    /// Size of the torn tail in bytes
    pub bytes_truncated: u64,

    /// Offset just past the last valid frame
    pub end_offset: u64,
}

impl LogRecovery {
    /// Recover a store file
    ///
    /// This will:
    /// 1. Write a fresh header into an empty file
    /// 2. Replay every valid frame through `apply`, in order
    /// 3. Truncate a torn final frame
    /// 4. Leave the file positioned at the end of the valid log
    pub fn recover<F>(file: &mut File, apply: F) -> Result<RecoveryResult>
    where
        F: FnMut(CommitRecord) -> Result<()>,
    {
        let len = file.metadata()?.len();

        if len == 0 {
            file.seek(SeekFrom::Start(0))?;
            write_file_header(file)?;
            file.sync_all()?;
            return Ok(RecoveryResult {
                end_offset: FILE_HEADER_SIZE,
                ..RecoveryResult::default()
            });
        }

        if len < FILE_HEADER_SIZE {
            return Err(CollectError::Corruption(format!(
                "store file is {} bytes, shorter than its header",
                len
            )));
        }

        file.seek(SeekFrom::Start(0))?;
        let result = Self::scan(BufReader::new(&*file), len, apply)?;

        if result.was_truncated {
            tracing::warn!(
                "Truncating {} bytes of torn commit data at offset {}",
                result.bytes_truncated,
                result.end_offset
            );
            file.set_len(result.end_offset)?;
            file.sync_all()?;
        }

        file.seek(SeekFrom::Start(result.end_offset))?;
        Ok(result)
    }

    /// Verify integrity of a store file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        if len < FILE_HEADER_SIZE {
            return Err(CollectError::Corruption(format!(
                "store file is {} bytes, shorter than its header",
                len
            )));
        }

        Self::scan(BufReader::new(file), len, |_| Ok(()))
    }

    fn scan<R, F>(mut reader: R, len: u64, mut apply: F) -> Result<RecoveryResult>
    where
        R: Read,
        F: FnMut(CommitRecord) -> Result<()>,
    {
        read_file_header(&mut reader)?;

        let mut log = LogReader::new(reader, FILE_HEADER_SIZE, len);
        let mut result = RecoveryResult {
            end_offset: FILE_HEADER_SIZE,
            ..RecoveryResult::default()
        };

        loop {
            match log.next_frame()? {
                FrameOutcome::Frame { record, end_offset } => {
                    if result.frames_recovered > 0 && record.txid <= result.last_txid {
                        return Err(CollectError::Corruption(format!(
                            "txid {} does not follow {}",
                            record.txid, result.last_txid
                        )));
                    }
                    result.last_txid = record.txid;
                    apply(record)?;
                    result.frames_recovered += 1;
                    result.end_offset = end_offset;
                }
                FrameOutcome::End => break,
                FrameOutcome::Torn { offset, reason } => {
                    tracing::warn!("Torn commit frame at offset {}: {}", offset, reason);
                    result.was_truncated = true;
                    result.bytes_truncated = len - offset;
                    result.end_offset = offset;
                    break;
                }
            }
        }

        Ok(result)
    }
}
