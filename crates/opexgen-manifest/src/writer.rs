//! Sidecar persistence.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use opexgen_core::Node;
use opexgen_ops::RetryPolicy;

/// What [`SidecarStore::persist`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// A new sidecar was written.
    Written,
    /// An existing sidecar was replaced because `force` is set.
    Overwritten,
    /// An existing sidecar was left untouched.
    Skipped,
}

/// Locates and writes sidecar documents next to their nodes.
///
/// A directory's sidecar lives inside it as `<dir>/<dirname><suffix>`; a
/// file's sidecar sits beside it as `<file><suffix>`.
#[derive(Debug, Clone)]
pub struct SidecarStore {
    suffix: String,
    force: bool,
    retry: RetryPolicy,
}

impl SidecarStore {
    /// Create a store.
    pub fn new(suffix: impl Into<String>, force: bool, retry: RetryPolicy) -> Self {
        Self {
            suffix: suffix.into(),
            force,
            retry,
        }
    }

    /// Sidecar suffix.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Whether existing sidecars are overwritten.
    pub fn force(&self) -> bool {
        self.force
    }

    /// File name of a node's sidecar.
    pub fn sidecar_name(&self, node: &Node) -> String {
        format!("{}{}", node.name, self.suffix)
    }

    /// Full path of a node's sidecar.
    pub fn sidecar_path(&self, node: &Node) -> PathBuf {
        let name = self.sidecar_name(node);
        if node.is_dir() {
            node.path.join(name)
        } else {
            node.path.with_file_name(name)
        }
    }

    /// Whether generation for a node is skipped because its sidecar exists.
    pub fn should_skip(&self, node: &Node) -> bool {
        !self.force && self.sidecar_path(node).exists()
    }

    /// Write sidecar bytes, honouring idempotence and retrying transient
    /// failures.
    pub fn persist(&self, path: &Path, bytes: &[u8]) -> io::Result<PersistOutcome> {
        let existed = path.exists();
        if existed && !self.force {
            debug!(path = %path.display(), "sidecar exists, skipping");
            return Ok(PersistOutcome::Skipped);
        }

        self.retry.run(|| write_atomic(path, bytes))?;
        debug!(path = %path.display(), "sidecar written");

        Ok(if existed {
            PersistOutcome::Overwritten
        } else {
            PersistOutcome::Written
        })
    }
}

/// Sibling file a sidecar is staged in before it is renamed into place.
///
/// The leading dot keeps a leftover from a crashed run out of later walks.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Write to a staging file first so a sidecar is never seen half written.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let staging = staging_path(path);
    let staged = File::create(&staging).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = staged.and_then(|()| fs::rename(&staging, path)) {
        let _ = fs::remove_file(&staging);
        return Err(e);
    }
    Ok(())
}
