//! Commit Log Writer
//!
//! Appends commit frames to the store file.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

use crate::config::SyncStrategy;
use crate::error::Result;

use super::CommitRecord;

/// Appends frames to the store file
///
/// The writer is positioned at the end of the valid log. A failed append is
/// cut back off the file so that a later append never lands after garbage.
pub struct LogWriter {
    /// Store file handle (shares the exclusive lock)
    file: File,

    /// Length of the valid log
    offset: u64,

    /// Whether each append is fsynced
    sync_strategy: SyncStrategy,
}

impl LogWriter {
    /// Wrap a recovered file positioned at `offset`
    pub fn new(file: File, offset: u64, sync_strategy: SyncStrategy) -> Self {
        Self {
            file,
            offset,
            sync_strategy,
        }
    }

    /// Append a commit record
    ///
    /// Returns the number of bytes appended. On failure the log is restored to
    /// its previous length before the error is returned.
    pub fn append(&mut self, record: &CommitRecord) -> Result<u64> {
        let frame = record.serialize()?;

        if let Err(e) = self.write_frame(&frame) {
            self.rollback();
            return Err(e);
        }

        self.offset += frame.len() as u64;
        Ok(frame.len() as u64)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Length of the valid log
    pub fn len(&self) -> u64 {
        self.offset
    }

    /// True when no frame follows the header
    pub fn is_empty(&self) -> bool {
        self.offset <= super::FILE_HEADER_SIZE
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.file.write_all(frame)?;
        if self.sync_strategy == SyncStrategy::EveryCommit {
            self.file.sync_data()?;
        }
        Ok(())
    }

    fn rollback(&mut self) {
        let restored = self
            .file
            .set_len(self.offset)
            .and_then(|_| self.file.seek(SeekFrom::Start(self.offset)).map(|_| ()));
        if let Err(e) = restored {
            tracing::error!(
                "Failed to cut back partial frame at offset {}: {}",
                self.offset,
                e
            );
        }
    }
}
