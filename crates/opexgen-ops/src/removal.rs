//! Subtree removal with an append-only removal log.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use jwalk::{Parallelism, WalkDir};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::RemovalError;

/// Reason recorded for directories pruned because they were empty.
pub const EMPTY_DIRECTORY_REASON: &str = "empty directory";

/// One deleted path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalLogEntry {
    /// The deleted path.
    pub path: PathBuf,
    /// Why it was deleted.
    pub reason: String,
    /// When it was deleted.
    pub removed_at: SystemTime,
}

/// Append-only record of every path deleted during a run.
///
/// With a sink attached, each entry is also appended to that file as soon as
/// it is recorded. The sink file is only created by the first entry.
#[derive(Debug, Default)]
pub struct RemovalLog {
    entries: Vec<RemovalLogEntry>,
    sink_path: Option<PathBuf>,
    sink: Option<File>,
}

impl RemovalLog {
    /// Create an in-memory log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log that also appends to `path`.
    pub fn with_sink(path: impl Into<PathBuf>) -> Self {
        Self {
            sink_path: Some(path.into()),
            ..Self::default()
        }
    }

    fn open_sink(path: &Path) -> Result<File, RemovalError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| RemovalError::io(dir, e))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| RemovalError::io(path, e))
    }

    /// Record a deleted path.
    pub fn record(
        &mut self,
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Result<(), RemovalError> {
        let entry = RemovalLogEntry {
            path: path.into(),
            reason: reason.into(),
            removed_at: SystemTime::now(),
        };

        if let Some(sink_path) = &self.sink_path {
            if self.sink.is_none() {
                self.sink = Some(Self::open_sink(sink_path)?);
            }
            if let Some(file) = &mut self.sink {
                writeln!(file, "{}\t{}", entry.path.display(), entry.reason)
                    .map_err(|e| RemovalError::io(sink_path, e))?;
            }
        }

        self.entries.push(entry);
        Ok(())
    }

    /// All entries in the order they were recorded.
    pub fn entries(&self) -> &[RemovalLogEntry] {
        &self.entries
    }

    /// Iterate over the logged paths.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|e| e.path.as_path())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been removed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// File the log is appended to, if any.
    pub fn sink_path(&self) -> Option<&Path> {
        self.sink_path.as_deref()
    }
}

/// Pre-order listing of a subtree, including its root, without following
/// symlinks.
fn list_subtree(path: &Path) -> Result<Vec<(PathBuf, bool)>, RemovalError> {
    let walker = WalkDir::new(path)
        .parallelism(Parallelism::Serial)
        .skip_hidden(false)
        .follow_links(false)
        .sort(true);

    walker
        .into_iter()
        .map(|entry| {
            entry
                .map(|e| (e.path(), e.file_type().is_dir()))
                .map_err(|err| RemovalError::Walk {
                    path: err.path().map(Path::to_path_buf).unwrap_or_else(|| path.to_path_buf()),
                    message: err.to_string(),
                })
        })
        .collect()
}

fn delete_one(path: &Path, is_dir: bool) -> Result<(), RemovalError> {
    let result = if is_dir {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| RemovalError::io(path, e))
}

/// Delete a file or a directory with everything below it.
///
/// Paths are deleted deepest first and each one is logged exactly once right
/// after it is gone. The first failure stops the removal.
///
/// Returns the number of deleted paths.
pub fn remove_tree(path: &Path, reason: &str, log: &mut RemovalLog) -> Result<usize, RemovalError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| RemovalError::io(path, e))?;

    let entries = if metadata.is_dir() {
        list_subtree(path)?
    } else {
        vec![(path.to_path_buf(), false)]
    };

    for (entry, is_dir) in entries.iter().rev() {
        delete_one(entry, *is_dir)?;
        log.record(entry, reason)?;
        debug!(path = %entry.display(), "removed");
    }

    info!(path = %path.display(), count = entries.len(), reason, "subtree removed");
    Ok(entries.len())
}

/// Delete every sidecar (file ending in `suffix`) below `root`.
///
/// Returns the deleted paths in walk order.
pub fn clear_sidecars(root: &Path, suffix: &str) -> Result<Vec<PathBuf>, RemovalError> {
    let mut removed = Vec::new();
    for (path, is_dir) in list_subtree(root)? {
        let is_sidecar = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().ends_with(suffix));
        if is_dir || !is_sidecar {
            continue;
        }
        delete_one(&path, false)?;
        debug!(path = %path.display(), "sidecar cleared");
        removed.push(path);
    }

    info!(root = %root.display(), count = removed.len(), "sidecars cleared");
    Ok(removed)
}

/// Remove empty directories below `root`, bottom-up.
///
/// A directory that becomes empty because its only children were empty
/// directories is removed as well. The root itself is never removed.
pub fn remove_empty_directories(root: &Path, log: &mut RemovalLog) -> Result<usize, RemovalError> {
    let mut count = 0;
    // The first entry is the root itself.
    for (path, is_dir) in list_subtree(root)?.into_iter().skip(1).rev() {
        if !is_dir {
            continue;
        }
        let mut listing = fs::read_dir(&path).map_err(|e| RemovalError::io(&path, e))?;
        if listing.next().is_some() {
            continue;
        }
        delete_one(&path, true)?;
        log.record(&path, EMPTY_DIRECTORY_REASON)?;
        count += 1;
    }

    if count > 0 {
        info!(root = %root.display(), count, "empty directories pruned");
    }
    Ok(count)
}
