//! # usercollect
//!
//! A small user-collection service over an embedded transactional store:
//! - Single-file store with a CRC-checked, append-only commit log
//! - Crash recovery with torn-tail truncation
//! - Single-writer/multi-reader snapshot isolation
//! - Secondary indexes for exact and prefix lookups
//! - JSON HTTP API with streamed backups
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       HTTP (axum)                            │
//! │            /users  /users/search  /backup  ...               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     UserStore                                │
//! │        (lifecycle, records, indexes, backup)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Db                                    │
//! │            (Single Writer / Multi Reader)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ Commit Log  │          │ Bucket Tree │
//!   │  (Append)   │          │    (CoW)    │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod codec;

pub mod wal;
pub mod tree;
pub mod storage;
pub mod users;
pub mod http;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CollectError, Result};
pub use config::{Config, DbOptions, SyncStrategy};
pub use storage::Db;
pub use users::{Backup, User, UserStore};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of usercollect
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
