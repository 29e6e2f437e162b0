//! Error types for usercollect
//!
//! Provides a unified error type for the engine, the record store and the
//! HTTP layer.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using CollectError
pub type Result<T> = std::result::Result<T, CollectError>;

/// Unified error type for usercollect operations
#[derive(Debug, Error)]
pub enum CollectError {
    // -------------------------------------------------------------------------
    // Input Errors
    // -------------------------------------------------------------------------
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Store file corruption detected: {0}")]
    Corruption(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Bucket already exists: {0}")]
    BucketExists(String),

    #[error("Incompatible value: {0}")]
    IncompatibleValue(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Timed out after {timeout:?} waiting for exclusive lock on {}", path.display())]
    LockTimeout { path: PathBuf, timeout: Duration },

    #[error("The store is not open")]
    NotOpen,

    #[error("The store is already open")]
    AlreadyOpen,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<bincode::Error> for CollectError {
    fn from(err: bincode::Error) -> Self {
        match *err {
            bincode::ErrorKind::Io(e) => CollectError::Io(e),
            other => CollectError::Serialization(other.to_string()),
        }
    }
}
