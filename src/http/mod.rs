//! HTTP Module
//!
//! JSON-over-HTTP front end for the user store.
//!
//! ## Architecture
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌───────────────────┐
//! │  TraceLayer  │────►│ TimeoutLayer │────►│ DefaultBodyLimit  │
//! └──────────────┘     └──────────────┘     └─────────┬─────────┘
//!                                                     │
//!                                                     ▼
//!                                            ┌─────────────────┐
//!                                            │    handlers     │
//!                                            │ (spawn_blocking)│
//!                                            └────────┬────────┘
//!                                                     │
//!                                                     ▼
//!                                            ┌─────────────────┐
//!                                            │   UserStore     │
//!                                            └─────────────────┘
//! ```

mod error;
mod handlers;
mod server;

pub use error::{status_for, ApiError};
pub use handlers::{AppState, IdResponse, SearchResult};
pub use server::{router, serve, serve_on};
