//! Database handle
//!
//! Coordinates the file lock, the commit log and the published snapshot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::DbOptions;
use crate::error::{CollectError, Result};
use crate::tree::Bucket;
use crate::wal::{BucketPath, CommitRecord, LogRecovery, LogWriter};

use super::lock::FileLock;
use super::tx::Snapshot;
use super::{ReadTx, WriteTx};

/// An open store file
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (`update`): serialized by the `writer` mutex
///   - Only ONE write transaction at a time
///   - Works on a private copy of the tree, appends one frame, then
///     publishes the new tree
///
/// - **Reads** (`view`, `begin_read`): never wait on writers
///   - Clone the published `Arc<Snapshot>` under a brief read lock
///   - Keep seeing that snapshot until they are dropped
pub struct Db {
    /// Path of the store file
    path: PathBuf,

    /// Options the store was opened with
    options: DbOptions,

    /// Latest committed state
    current: RwLock<Arc<Snapshot>>,

    /// Commit log and sequence bookkeeping (exclusive access needed)
    writer: Mutex<WriterState>,

    /// Exclusive lock on the store file, released on drop
    _lock: FileLock,
}

struct WriterState {
    log: LogWriter,

    /// Sequence values handed out to transactions that never committed
    sequence_floors: HashMap<BucketPath, u64>,
}

impl WriterState {
    fn consume(&mut self, issued: HashMap<BucketPath, u64>) {
        for (path, sequence) in issued {
            let floor = self.sequence_floors.entry(path).or_insert(0);
            *floor = (*floor).max(sequence);
        }
    }
}

impl Db {
    /// Open or create a store file
    ///
    /// On open:
    /// 1. Acquire the exclusive file lock (bounded by `lock_timeout`)
    /// 2. Replay the commit log into a fresh tree
    /// 3. Truncate any torn tail
    /// 4. Ready to serve transactions
    pub fn open(path: impl AsRef<Path>, options: DbOptions) -> Result<Self> {
        let path = path.as_ref();
        let lock = FileLock::acquire(path, options.lock_timeout)?;
        let mut file = lock.file().try_clone()?;

        let mut root = Bucket::new();
        let recovery = LogRecovery::recover(&mut file, |record| root.apply_record(record))?;

        tracing::info!(
            "Opened store {}: {} commits replayed, last txid {}{}",
            path.display(),
            recovery.frames_recovered,
            recovery.last_txid,
            if recovery.was_truncated {
                " (torn tail removed)"
            } else {
                ""
            }
        );

        let log = LogWriter::new(file, recovery.end_offset, options.sync_strategy);

        Ok(Self {
            path: path.to_path_buf(),
            options,
            current: RwLock::new(Arc::new(Snapshot {
                txid: recovery.last_txid,
                root,
            })),
            writer: Mutex::new(WriterState {
                log,
                sequence_floors: HashMap::new(),
            }),
            _lock: lock,
        })
    }

    /// Begin a read-only transaction
    pub fn begin_read(&self) -> ReadTx {
        ReadTx::new(Arc::clone(&self.current.read()))
    }

    /// Run `f` inside a read-only transaction
    pub fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&ReadTx) -> Result<T>,
    {
        let tx = self.begin_read();
        f(&tx)
    }

    /// Run `f` inside a read-write transaction and commit it.
    ///
    /// If `f` fails, or the commit cannot be made durable, nothing `f` did
    /// becomes visible. Sequence values handed out stay consumed either way.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut WriteTx) -> Result<T>,
    {
        let mut writer = self.writer.lock();
        let base = Arc::clone(&self.current.read());

        let mut tx = WriteTx::new(base.root.clone(), writer.sequence_floors.clone());
        let outcome = f(&mut tx);
        let (root, operations, issued) = tx.into_parts();

        let value = match outcome {
            Ok(value) => value,
            Err(e) => {
                writer.consume(issued);
                return Err(e);
            }
        };

        if operations.is_empty() {
            return Ok(value);
        }

        let txid = base.txid + 1;
        let record = CommitRecord::new(txid, operations);

        match writer.log.append(&record) {
            Ok(bytes) => {
                tracing::trace!("Committed txid {} ({} bytes)", txid, bytes);
            }
            Err(e) => {
                writer.consume(issued);
                tracing::error!("Commit of txid {} failed: {}", txid, e);
                return Err(CollectError::StorageUnavailable(format!(
                    "commit of txid {} failed: {}",
                    txid, e
                )));
            }
        }

        *self.current.write() = Arc::new(Snapshot { txid, root });
        Ok(value)
    }

    /// Force the store file to disk
    pub fn sync(&self) -> Result<()> {
        self.writer.lock().log.sync()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the store file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the options the store was opened with
    pub fn options(&self) -> &DbOptions {
        &self.options
    }

    /// Transaction id of the latest commit
    pub fn txid(&self) -> u64 {
        self.current.read().txid
    }

    /// Current length of the store file
    pub fn file_len(&self) -> u64 {
        self.writer.lock().log.len()
    }
}
