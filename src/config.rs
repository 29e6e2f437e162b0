//! Configuration for usercollect
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a usercollect instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Path of the single store file (header + commit frames)
    pub db_path: PathBuf,

    /// How long `open` waits for the exclusive file lock
    pub lock_timeout: Duration,

    /// Sync strategy: whether each commit is fsynced
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // HTTP Configuration
    // -------------------------------------------------------------------------
    /// HTTP listen address
    pub listen_addr: String,

    /// Max accepted request body (bytes)
    pub max_request_bytes: usize,

    /// Upper bound on producing a response (body streaming is not bounded)
    pub request_timeout: Duration,
}

/// Commit sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every commit (safest, slowest)
    EveryCommit,

    /// Leave flushing to the OS page cache (tests, bulk loads)
    OsBuffered,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./usercollect.db"),
            lock_timeout: Duration::from_secs(10),
            sync_strategy: SyncStrategy::EveryCommit,
            listen_addr: "0.0.0.0:8080".to_string(),
            max_request_bytes: 1024,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Engine-level subset of this configuration
    pub fn db_options(&self) -> DbOptions {
        DbOptions {
            lock_timeout: self.lock_timeout,
            sync_strategy: self.sync_strategy,
        }
    }
}

/// Options consumed by [`crate::storage::Db::open`]
#[derive(Debug, Clone, Copy)]
pub struct DbOptions {
    pub lock_timeout: Duration,
    pub sync_strategy: SyncStrategy,
}

impl Default for DbOptions {
    fn default() -> Self {
        Config::default().db_options()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the store file path
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_path = path.into();
        self
    }

    /// Set the lock acquisition timeout
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = timeout;
        self
    }

    /// Set the commit sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the HTTP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum request body size (in bytes)
    pub fn max_request_bytes(mut self, bytes: usize) -> Self {
        self.config.max_request_bytes = bytes;
        self
    }

    /// Set the per-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
