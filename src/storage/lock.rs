//! File Lock
//!
//! Exclusive advisory lock on the store file, held for the lifetime of a `Db`.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{CollectError, Result};

/// First retry delay; doubles up to `MAX_RETRY_DELAY`
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(10);
const MAX_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Exclusive lock on the store file.
///
/// Acquired on open, released on drop (RAII).
pub struct FileLock {
    /// The locked file handle (kept open to maintain the lock)
    file: File,
    /// Path to the store file
    path: PathBuf,
}

impl FileLock {
    /// Open (creating if needed) and exclusively lock the file at `path`.
    ///
    /// Retries with exponential backoff until `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns `CollectError::LockTimeout` if another handle keeps the lock
    /// past the timeout, or `CollectError::Io` if the path is unusable.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let deadline = Instant::now() + timeout;
        let mut retry_delay = INITIAL_RETRY_DELAY;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    tracing::debug!("Acquired exclusive lock on {}", path.display());
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if is_contended(&e) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(CollectError::LockTimeout {
                            path: path.to_path_buf(),
                            timeout,
                        });
                    }
                    std::thread::sleep(retry_delay.min(deadline - now));
                    retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
                }
                Err(e) => return Err(CollectError::Io(e)),
            }
        }
    }

    /// Get the locked file handle
    pub fn file(&self) -> &File {
        &self.file
    }

    /// Get the path to the store file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
