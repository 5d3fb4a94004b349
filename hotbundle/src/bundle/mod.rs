//! Bundle identity and status types.
//!
//! A bundle is a versioned, self-contained set of web assets rooted at an
//! `index.html`. This module holds the record persisted for every downloaded
//! bundle and the two sentinel identities that never touch storage:
//!
//! - **builtin**: the assets shipped inside the host application
//! - **unknown**: placeholder returned when no id is available
//!
//! # Record Lifecycle
//!
//! ```text
//! DOWNLOADING ──► PENDING ──► SUCCESS
//!                    │
//!                    └──────► ERROR
//!
//! any non-DELETED ──(delete, keep record)──► DELETED
//! any ──(delete, purge record)──► removed
//! ```

mod info;

pub use info::{BundleInfo, BundleStatus, BUILTIN_ID, BUILTIN_PATH, INDEX_FILE, UNKNOWN_ID};
pub(crate) use info::is_sentinel_id;
