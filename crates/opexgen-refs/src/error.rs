//! Error types for reference export.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while exporting references.
#[derive(Debug, Error)]
pub enum RefsError {
    /// I/O error on the export file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The table could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl RefsError {
    /// Create an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
