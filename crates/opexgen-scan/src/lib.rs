//! Directory walking for opexgen.
//!
//! This crate turns a directory tree into a flat, ordered
//! [`NodeTable`](opexgen_core::NodeTable) using jwalk for traversal.
//!
//! # Overview
//!
//! - **Serial, depth-first** traversal so the order is reproducible
//! - **Filter + sort per directory** before sibling indexes are assigned
//! - **Unreadable directories** become leaves and are reported as warnings
//!
//! # Example
//!
//! ```rust,no_run
//! use opexgen_scan::{TreeWalker, WalkConfig};
//!
//! let outcome = TreeWalker::new(WalkConfig::new("/path/to/archive")).walk().unwrap();
//!
//! for node in outcome.table.iter() {
//!     println!("{} {}", node.sibling_index, node.path.display());
//! }
//! ```

mod filter;
mod walker;

pub use filter::EntryFilter;
pub use walker::{TreeWalker, WalkOutcome};

// Re-export core types for convenience
pub use opexgen_core::{
    Node, NodeId, NodeKind, NodeTable, ParentLookup, RunWarning, ScanError, SortKey, WalkConfig,
    WarningKind,
};
