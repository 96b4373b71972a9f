//! Core types for opexgen.
//!
//! This crate provides the data structures shared by every stage of a run:
//! the walked node table, walk configuration and the error/warning types.

mod config;
mod error;
mod node;
mod table;

pub use config::{
    DEFAULT_SIDECAR_SUFFIX, META_DIR_NAME, SortKey, WalkConfig, WalkConfigBuilder,
};
pub use error::{RunWarning, ScanError, WarningKind};
pub use node::{Node, NodeId, NodeKind, Timestamps};
pub use table::{NodeTable, ParentLookup, TreeStats};
