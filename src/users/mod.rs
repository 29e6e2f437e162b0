//! Users Module
//!
//! Schema, record operations and backup for the user collection.
//!
//! ## Responsibilities
//! - Create the bucket layout on start
//! - Assign ids and keep the email/phone indexes in step with the records
//! - Exact and prefix lookups
//! - Consistent backups of the whole store
//!
//! ## Write Path
//! ```text
//! add_user(User)
//!     │
//!     ├─► validate email ──► Validation
//!     │
//!     └─► Db::update ───────────────────────────────┐
//!           ├─► reject indexed email / phone        │ one
//!           ├─► users.next_sequence() ──► id        │ commit
//!           ├─► users[id] = JSON                    │ frame
//!           ├─► userevents/<id>/                    │
//!           └─► emailtouserid, phonenotouserid      │
//!                                                   ┘
//! ```

mod backup;
mod model;
pub mod schema;
mod store;

pub use backup::Backup;
pub use model::{is_email_valid, User};
pub use store::UserStore;
