//! File and directory node types.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Index of a node within a [`NodeTable`](crate::NodeTable).
///
/// Ids are assigned in walk (pre-)order, so the scan root is always `NodeId(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The scan root.
    pub const ROOT: NodeId = NodeId(0);

    /// Create a new NodeId.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Position of the node in its table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// File metadata timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    /// Last modification time.
    pub modified: SystemTime,
    /// Last access time (if available).
    pub accessed: Option<SystemTime>,
    /// Creation time (if available, platform-dependent).
    pub created: Option<SystemTime>,
}

impl Timestamps {
    /// Create timestamps with only modified time.
    pub fn with_modified(modified: SystemTime) -> Self {
        Self {
            modified,
            accessed: None,
            created: None,
        }
    }

    /// Create timestamps with all available times.
    pub fn new(
        modified: SystemTime,
        accessed: Option<SystemTime>,
        created: Option<SystemTime>,
    ) -> Self {
        Self {
            modified,
            accessed,
            created,
        }
    }

    /// Read timestamps from file system metadata.
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        Self::new(
            metadata.modified().unwrap_or(std::time::UNIX_EPOCH),
            metadata.accessed().ok(),
            metadata.created().ok(),
        )
    }
}

/// Type of file system node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Directory.
    #[serde(rename = "Dir")]
    Directory,
    /// Regular file.
    File,
}

impl NodeKind {
    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, NodeKind::Directory)
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, NodeKind::File)
    }

    /// Short label used in exported tables.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Directory => "Dir",
            NodeKind::File => "File",
        }
    }
}

/// A single file or directory found by the walker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Position in the table.
    pub id: NodeId,

    /// Canonical absolute path.
    pub path: PathBuf,

    /// File/directory name (not full path).
    pub name: CompactString,

    /// Containing directory, `None` for the scan root.
    pub parent: Option<NodeId>,

    /// Node type.
    pub kind: NodeKind,

    /// Depth below the scan root (root = 0).
    pub level: u32,

    /// 1-based position among the filtered, sorted siblings. The root has 0.
    pub sibling_index: u32,

    /// Size in bytes (as reported by the file system).
    pub size: u64,

    /// File metadata timestamps.
    pub timestamps: Timestamps,
}

impl Node {
    /// Check if this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Check if this node is a file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Check if this node is the scan root.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Full path of the node.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without its final extension.
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() && self.is_file() => stem,
            _ => self.name.as_str(),
        }
    }

    /// Final extension including the leading dot, empty for directories.
    pub fn extension(&self) -> &str {
        if self.is_dir() {
            return "";
        }
        match self.name.rfind('.') {
            Some(0) | None => "",
            Some(pos) => &self.name[pos..],
        }
    }
}
