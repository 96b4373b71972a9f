//! JWalk-based serial directory walker.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use compact_str::CompactString;
use jwalk::{Parallelism, WalkDir};
use tracing::{debug, warn};

use opexgen_core::{
    Node, NodeId, NodeKind, NodeTable, RunWarning, ScanError, Timestamps, WalkConfig, WarningKind,
};

use crate::filter::EntryFilter;

/// Result of a walk: the node table plus anything worth reporting.
#[derive(Debug)]
pub struct WalkOutcome {
    /// All accepted nodes in pre-order.
    pub table: NodeTable,
    /// Non-fatal problems met while walking.
    pub warnings: Vec<RunWarning>,
    /// Time spent walking.
    pub duration: Duration,
}

/// Deterministic, single-threaded tree walker.
///
/// Every directory listing is filtered and sorted before any of its entries
/// is yielded, so sibling indexes only depend on the tree and the config.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    config: WalkConfig,
}

impl TreeWalker {
    /// Create a walker for the given configuration.
    pub fn new(config: WalkConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &WalkConfig {
        &self.config
    }

    /// Walk the tree and build its node table.
    pub fn walk(&self) -> Result<WalkOutcome, ScanError> {
        let start = Instant::now();
        let root_path = self
            .config
            .root
            .canonicalize()
            .map_err(|e| ScanError::io(&self.config.root, e))?;

        if !root_path.is_dir() {
            return Err(ScanError::NotADirectory { path: root_path });
        }

        let root_metadata =
            std::fs::metadata(&root_path).map_err(|e| ScanError::io(&root_path, e))?;
        let filter = Arc::new(EntryFilter::new(&self.config)?);
        let sort_key = self.config.sort_key;

        let mut table = NodeTable::with_root(Node {
            id: NodeId::ROOT,
            name: entry_name(&root_path),
            path: root_path.clone(),
            parent: None,
            kind: NodeKind::Directory,
            level: 0,
            sibling_index: 0,
            size: root_metadata.len(),
            timestamps: Timestamps::from_metadata(&root_metadata),
        });
        let mut warnings = Vec::new();
        let mut counters: HashMap<NodeId, u32> = HashMap::new();

        let walker = WalkDir::new(&root_path)
            .parallelism(Parallelism::Serial)
            .skip_hidden(false)
            .follow_links(false)
            .min_depth(1)
            .process_read_dir(move |_depth, _dir, _state, children| {
                children.retain(|entry| match entry {
                    Ok(e) => {
                        let file_type = e.file_type();
                        (file_type.is_dir() || file_type.is_file())
                            && filter.accepts(&e.file_name().to_string_lossy(), &e.path())
                    }
                    // Keep errors so they surface as warnings.
                    Err(_) => true,
                });
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => sort_key.compare(
                        &a.file_name().to_string_lossy(),
                        a.file_type().is_dir(),
                        &b.file_name().to_string_lossy(),
                        b.file_type().is_dir(),
                    ),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => Ordering::Equal,
                });
            });

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| root_path.clone());
                    warn!(path = %path.display(), error = %err, "cannot list directory, treating it as a leaf");
                    warnings.push(RunWarning::read_error(path, &err));
                    continue;
                }
            };

            let path = entry.path();
            let Some(parent) = path.parent().and_then(|p| table.find(p)).map(|n| n.id) else {
                // The parent itself was dropped (e.g. unreadable metadata).
                debug!(path = %path.display(), "skipping entry without a walked parent");
                continue;
            };

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    warnings.push(RunWarning::new(
                        &path,
                        err.to_string(),
                        WarningKind::MetadataError,
                    ));
                    continue;
                }
            };

            let counter = counters.entry(parent).or_insert(0);
            *counter += 1;
            let sibling_index = *counter;

            let kind = if entry.file_type().is_dir() {
                NodeKind::Directory
            } else {
                NodeKind::File
            };

            let id = table.next_id();
            table.push(Node {
                id,
                name: CompactString::new(entry.file_name().to_string_lossy()),
                path,
                parent: Some(parent),
                kind,
                level: entry.depth() as u32,
                sibling_index,
                size: metadata.len(),
                timestamps: Timestamps::from_metadata(&metadata),
            });

            if id.0 % 1000 == 0 {
                debug!(nodes = table.len(), "walk progress");
            }
        }

        let duration = start.elapsed();
        debug!(
            root = %root_path.display(),
            nodes = table.len(),
            warnings = warnings.len(),
            elapsed_ms = duration.as_millis() as u64,
            "walk complete"
        );

        Ok(WalkOutcome {
            table,
            warnings,
            duration,
        })
    }
}

fn entry_name(path: &Path) -> CompactString {
    path.file_name()
        .map(|n| CompactString::new(n.to_string_lossy()))
        .unwrap_or_else(|| CompactString::new(path.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opexgen_core::SortKey;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("beta")).unwrap();
        fs::create_dir(root.join("Alpha")).unwrap();
        fs::create_dir(root.join("meta")).unwrap();
        fs::write(root.join("zeta.txt"), "z").unwrap();
        fs::write(root.join("apple.txt"), "apple").unwrap();
        fs::write(root.join("apple.txt.opex"), "<x/>").unwrap();
        fs::write(root.join(".hidden"), "h").unwrap();
        fs::write(root.join("Alpha/one.txt"), "1").unwrap();

        temp
    }

    fn names(table: &NodeTable, id: NodeId) -> Vec<String> {
        table
            .children(id)
            .iter()
            .map(|c| table.node(*c).name.to_string())
            .collect()
    }

    #[test]
    fn test_folders_first_walk() {
        let temp = create_test_tree();
        let outcome = TreeWalker::new(WalkConfig::new(temp.path())).walk().unwrap();
        let table = &outcome.table;

        assert_eq!(
            names(table, NodeId::ROOT),
            vec!["Alpha", "beta", "apple.txt", "zeta.txt"]
        );
        let indexes: Vec<u32> = table
            .children(NodeId::ROOT)
            .iter()
            .map(|c| table.node(*c).sibling_index)
            .collect();
        assert_eq!(indexes, vec![1, 2, 3, 4]);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_alphabetical_walk() {
        let temp = create_test_tree();
        let mut config = WalkConfig::new(temp.path());
        config.sort_key = SortKey::Alphabetical;
        let outcome = TreeWalker::new(config).walk().unwrap();

        assert_eq!(
            names(&outcome.table, NodeId::ROOT),
            vec!["Alpha", "apple.txt", "beta", "zeta.txt"]
        );
    }

    #[test]
    fn test_levels_and_parents() {
        let temp = create_test_tree();
        let outcome = TreeWalker::new(WalkConfig::new(temp.path())).walk().unwrap();
        let table = &outcome.table;

        let one = table
            .iter()
            .find(|n| n.name == "one.txt")
            .expect("nested file walked");
        assert_eq!(one.level, 2);
        assert_eq!(one.sibling_index, 1);
        let parent = table.node(one.parent.unwrap());
        assert_eq!(parent.name, "Alpha");
        assert_eq!(table.root().level, 0);
        assert_eq!(table.stats().total_files, 3);
        assert_eq!(table.stats().total_dirs, 2);
    }

    #[test]
    fn test_root_must_be_directory() {
        let temp = create_test_tree();
        let config = WalkConfig::new(temp.path().join("zeta.txt"));
        assert!(matches!(
            TreeWalker::new(config).walk(),
            Err(ScanError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_walk_is_deterministic() {
        let temp = create_test_tree();
        let walker = TreeWalker::new(WalkConfig::new(temp.path()));
        let first: Vec<(String, u32)> = walker
            .walk()
            .unwrap()
            .table
            .iter()
            .map(|n| (n.path.display().to_string(), n.sibling_index))
            .collect();
        let second: Vec<(String, u32)> = walker
            .walk()
            .unwrap()
            .table
            .iter()
            .map(|n| (n.path.display().to_string(), n.sibling_index))
            .collect();
        assert_eq!(first, second);
    }
}
