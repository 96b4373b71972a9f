//! Filesystem mutation for opexgen.
//!
//! Everything in this crate changes the tree on disk: subtree removal with an
//! append-only [`RemovalLog`], sidecar clearing and empty-directory pruning.
//! [`RetryPolicy`] wraps the non-destructive writes of a run; removals are
//! never retried and every [`RemovalError`] is fatal.

mod error;
mod removal;
mod retry;

pub use error::RemovalError;
pub use removal::{
    EMPTY_DIRECTORY_REASON, RemovalLog, RemovalLogEntry, clear_sidecars, remove_empty_directories,
    remove_tree,
};
pub use retry::{RetryPolicy, RetryPolicyBuilder, is_transient};
