//! Flat node table produced by the walker and its statistics.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::node::{Node, NodeId, NodeKind};

/// Summary statistics for a walked tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    /// Total size of all files in bytes.
    pub total_size: u64,
    /// Total number of files.
    pub total_files: u64,
    /// Total number of directories, excluding the root.
    pub total_dirs: u64,
    /// Maximum depth reached.
    pub max_depth: u32,
}

impl TreeStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a file entry.
    pub fn record_file(&mut self, size: u64, depth: u32) {
        self.total_files += 1;
        self.total_size += size;
        self.max_depth = self.max_depth.max(depth);
    }

    /// Record a directory.
    pub fn record_dir(&mut self, depth: u32) {
        self.total_dirs += 1;
        self.max_depth = self.max_depth.max(depth);
    }
}

/// Result of looking up a node's parent.
///
/// Reaching the scan root is the normal terminator of every upward walk,
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentLookup {
    /// The parent is present in the table.
    Found(NodeId),
    /// The node is the scan root.
    AtRoot,
}

/// All nodes of one walk, in pre-order.
///
/// The table is built once and is read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTable {
    nodes: Vec<Node>,
    children: Vec<Vec<NodeId>>,
    #[serde(skip)]
    by_path: HashMap<PathBuf, NodeId>,
    stats: TreeStats,
}

impl NodeTable {
    /// Create a table holding only the scan root.
    pub fn with_root(root: Node) -> Self {
        debug_assert_eq!(root.id, NodeId::ROOT);
        debug_assert!(root.parent.is_none());
        let mut by_path = HashMap::new();
        by_path.insert(root.path.clone(), NodeId::ROOT);
        Self {
            nodes: vec![root],
            children: vec![Vec::new()],
            by_path,
            stats: TreeStats::new(),
        }
    }

    /// Id the next pushed node will receive.
    pub fn next_id(&self) -> NodeId {
        NodeId::new(self.nodes.len() as u32)
    }

    /// Append a node. Its parent must already be present.
    ///
    /// # Panics
    ///
    /// Panics if the node's id is not [`next_id`](Self::next_id) or it has no
    /// parent in the table.
    pub fn push(&mut self, node: Node) -> NodeId {
        let id = self.next_id();
        assert_eq!(node.id, id, "node ids must be assigned in push order");
        let parent = node.parent.expect("only the root may lack a parent");
        assert!(parent.index() < self.nodes.len(), "parent must precede child");

        match node.kind {
            NodeKind::File => self.stats.record_file(node.size, node.level),
            NodeKind::Directory => self.stats.record_dir(node.level),
        }

        self.children[parent.index()].push(id);
        self.children.push(Vec::new());
        self.by_path.insert(node.path.clone(), id);
        self.nodes.push(node);
        id
    }

    /// The scan root.
    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    /// Get a node by id.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Get a node by id, panicking on a foreign id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Find a node by its full path.
    pub fn find(&self, path: &Path) -> Option<&Node> {
        self.by_path.get(path).map(|id| self.node(*id))
    }

    /// Direct children in walk order (filtered and sorted).
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children
            .get(id.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Look up the parent of a node.
    pub fn lookup_parent(&self, id: NodeId) -> ParentLookup {
        match self.get(id).and_then(|n| n.parent) {
            Some(parent) => ParentLookup::Found(parent),
            None => ParentLookup::AtRoot,
        }
    }

    /// All ids of the subtree rooted at `id`, in pre-order, including `id`.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Iterate over all nodes in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A table always holds at least the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Summary statistics.
    pub fn stats(&self) -> &TreeStats {
        &self.stats
    }

    /// Rebuild the path index after deserialization.
    pub fn reindex(&mut self) {
        self.by_path = self
            .nodes
            .iter()
            .map(|n| (n.path.clone(), n.id))
            .collect();
    }
}
