//! Entry filtering applied to every directory listing.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

use opexgen_core::{ScanError, WalkConfig};

/// Decides which directory entries become nodes.
///
/// An entry is rejected when it is hidden (and hidden entries are not
/// included), has a reserved name, is a sidecar document, is one of the
/// run's own output files, or matches an exclude pattern.
#[derive(Debug, Clone)]
pub struct EntryFilter {
    config: WalkConfig,
    patterns: GlobSet,
}

impl EntryFilter {
    /// Build a filter from a walk configuration.
    pub fn new(config: &WalkConfig) -> Result<Self, ScanError> {
        // An empty suffix would match every name.
        if config.sidecar_suffix.is_empty() {
            return Err(ScanError::InvalidConfig {
                message: "sidecar suffix cannot be empty".to_string(),
            });
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in &config.exclude_patterns {
            let glob = Glob::new(pattern).map_err(|e| ScanError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            builder.add(glob);
        }
        let patterns = builder.build().map_err(|e| ScanError::InvalidPattern {
            pattern: config.exclude_patterns.join(", "),
            message: e.to_string(),
        })?;

        // Output files may not exist yet, so fall back to the path as given.
        let mut config = config.clone();
        for path in &mut config.excluded_paths {
            if let Ok(canonical) = path.canonicalize() {
                *path = canonical;
            }
        }

        Ok(Self { config, patterns })
    }

    /// Check whether an entry should be part of the tree.
    pub fn accepts(&self, name: &str, path: &Path) -> bool {
        if self.config.should_skip_hidden(name) || self.config.is_reserved(name) {
            return false;
        }
        if self.config.is_excluded_path(path) {
            return false;
        }
        !self.patterns.is_match(name)
    }
}
