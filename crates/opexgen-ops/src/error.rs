//! Error types for filesystem mutation.

use std::path::PathBuf;

use thiserror::Error;

/// A destructive operation failed.
///
/// Every variant is fatal for the run: a removal that stops half way must not
/// be followed by further mutation.
#[derive(Debug, Error)]
pub enum RemovalError {
    /// The target does not exist.
    #[error("Nothing to remove at {0}")]
    NotFound(PathBuf),

    /// Listing the subtree failed.
    #[error("Failed to list {path}: {message}")]
    Walk { path: PathBuf, message: String },

    /// Deleting or logging a path failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RemovalError {
    /// Create an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io { path, source }
        }
    }

    /// Path the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::NotFound(path) => path,
            Self::Walk { path, .. } | Self::Io { path, .. } => path,
        }
    }
}
