//! Atomic, lock-serialized filesystem mutation for the managed
//! configuration directory.
//!
//! This crate is the only place in the workspace that writes configuration
//! bytes to disk. Everything above it (templates, backups, field updaters)
//! goes through [`atomic_write`]/[`Transaction`]/[`LockTable`] rather than
//! touching `tokio::fs` directly.

pub mod atomic;
pub mod error;
pub mod listing;
pub mod locks;
pub mod transaction;

pub use atomic::{atomic_write, read_capped, remove_if_exists};
pub use error::FileOpsError;
pub use listing::{list_files, resolve_within, DirEntryInfo};
pub use locks::{LockTable, PathGuard};
pub use transaction::{Transaction, TransactionRunner};
