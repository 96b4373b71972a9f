//! Error types for manifest composition.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use opexgen_core::ScanError;
use opexgen_ops::RemovalError;
use opexgen_refs::RefsError;

/// Fatal errors that abort a run.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The tree could not be walked.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The metadata store lacks a column the run depends on.
    #[error("Metadata store is missing required column '{column}'")]
    SchemaMismatch { column: String },

    /// The metadata store could not be parsed.
    #[error("Invalid metadata store {path}: {message}")]
    InvalidStore { path: PathBuf, message: String },

    /// Invalid run configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A removal failed part way; no further mutation was attempted.
    #[error("Removal failed: {0}")]
    DestructiveOp(#[from] RemovalError),

    /// The caller declined the removal pass.
    #[error("Removal of {0} paths was declined; nothing was changed")]
    RemovalDeclined(usize),

    /// The reference table could not be exported.
    #[error(transparent)]
    Export(#[from] RefsError),

    /// I/O error outside of per-node work.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A descriptor could not be rendered.
    #[error("Failed to render descriptor: {0}")]
    Render(String),
}

impl ManifestError {
    /// Create an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a schema mismatch for a column.
    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            column: column.into(),
        }
    }
}

/// A node whose descriptor could not be produced.
///
/// Node failures are collected in the run report; the walk carries on with
/// the remaining subtrees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFailure {
    /// Path of the node.
    pub path: PathBuf,
    /// What went wrong.
    pub message: String,
}

impl NodeFailure {
    /// Create a new node failure.
    pub fn new(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
