//! Run report aggregation.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use opexgen_core::{RunWarning, TreeStats, WarningKind};
use opexgen_ops::RemovalLogEntry;

use crate::error::NodeFailure;

/// Outcome of one run. Non-fatal conditions end up here instead of aborting
/// the walk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Canonical root of the run.
    pub root: PathBuf,
    /// Statistics of the walked tree.
    pub stats: TreeStats,
    /// Directory sidecars written or overwritten.
    pub directories_written: u64,
    /// File sidecars written or overwritten.
    pub files_written: u64,
    /// Sidecars left untouched because they already existed.
    pub skipped_existing: u64,
    /// Non-fatal warnings.
    pub warnings: Vec<RunWarning>,
    /// Nodes whose sidecar could not be produced.
    pub failures: Vec<NodeFailure>,
    /// Deleted paths.
    pub removed: Vec<RemovalLogEntry>,
    /// Number of fixity values recorded.
    pub fixities: u64,
    /// Written reference table, if exported.
    pub references_exported: Option<PathBuf>,
    /// Written fixity log, if any.
    pub fixity_log: Option<PathBuf>,
    /// Written removal log, if anything was removed.
    pub removal_log: Option<PathBuf>,
    /// Wall-clock duration.
    pub duration: Duration,
}

impl RunReport {
    /// Create an empty report for a root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Record a warning.
    pub fn warn(&mut self, warning: RunWarning) {
        self.warnings.push(warning);
    }

    /// Record a node failure.
    pub fn fail(&mut self, failure: NodeFailure) {
        self.failures.push(failure);
    }

    /// Total sidecars written.
    pub fn sidecars_written(&self) -> u64 {
        self.directories_written + self.files_written
    }

    /// Whether every node was processed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of warnings of a kind.
    pub fn warning_count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    /// One-line summary.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Wrote {} sidecars ({} directories, {} files), skipped {} existing",
            self.sidecars_written(),
            self.directories_written,
            self.files_written,
            self.skipped_existing
        );
        if !self.removed.is_empty() {
            summary.push_str(&format!(", removed {} paths", self.removed.len()));
        }
        if !self.failures.is_empty() {
            summary.push_str(&format!(", {} failed", self.failures.len()));
        }
        summary
    }
}
