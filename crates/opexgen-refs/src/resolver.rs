//! Hierarchical archive reference resolution.
//!
//! Every node's archive reference is built by walking its parent chain up to
//! the scan root, prepending one segment per ancestor:
//!
//! ```text
//! root            COLL
//! root/A          COLL/1
//! root/A/a2.txt   COLL/1/2
//! root/B          COLL/2
//! ```
//!
//! Segments are normally the node's sibling index. Keyword-matched
//! directories use an alphabetic code instead; with `retain_order = false`
//! they also stop advancing the numbering of their siblings.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use opexgen_core::{NodeId, NodeTable, ParentLookup};

use crate::accession::AccessionCounter;
use crate::keyword::KeywordRules;
use crate::mode::{AccessionConfig, CatalogConfig, RefMode};

/// References computed for one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Hierarchical reference, e.g. `COLL/1/2`.
    pub archive: String,
    /// Flat accession reference, when the mode assigns one and the node is
    /// not removed by the run.
    pub accession: Option<String>,
}

/// References for every node of a table, indexed by [`NodeId`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceMap {
    records: Vec<ReferenceRecord>,
}

impl ReferenceMap {
    /// Record for a node.
    pub fn get(&self, id: NodeId) -> Option<&ReferenceRecord> {
        self.records.get(id.index())
    }

    /// Archive reference for a node.
    pub fn archive(&self, id: NodeId) -> Option<&str> {
        self.get(id).map(|r| r.archive.as_str())
    }

    /// Accession reference for a node.
    pub fn accession(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|r| r.accession.as_deref())
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over `(id, record)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ReferenceRecord)> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| (NodeId::new(i as u32), r))
    }
}

/// Computes [`ReferenceMap`]s for a reference mode.
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    catalog: CatalogConfig,
    accession: Option<AccessionConfig>,
    keywords: Option<KeywordRules>,
}

impl ReferenceResolver {
    /// Create a resolver. Modes without catalog settings still get plain
    /// archive references built with the default catalog settings.
    pub fn new(mode: &RefMode) -> Self {
        let catalog = mode.catalog().cloned().unwrap_or_default();
        let keywords = catalog.keywords.as_ref().map(KeywordRules::new);
        Self {
            catalog,
            accession: mode.accession().cloned(),
            keywords,
        }
    }

    /// Resolve references assuming no node is removed.
    pub fn resolve(&self, table: &NodeTable) -> ReferenceMap {
        self.resolve_with(table, &|_| false)
    }

    /// Resolve references.
    ///
    /// `removed` flags paths the run will delete; such nodes and everything
    /// below them keep their archive references (siblings were numbered with
    /// them present) but receive no accession reference.
    pub fn resolve_with(&self, table: &NodeTable, removed: &dyn Fn(&Path) -> bool) -> ReferenceMap {
        let segments = self.segments(table);
        let accession = self.accession_references(table, removed);

        let records: Vec<ReferenceRecord> = table
            .iter()
            .zip(accession)
            .map(|(node, accession)| ReferenceRecord {
                archive: self.archive_reference(table, &segments, node.id),
                accession,
            })
            .collect();

        debug!(nodes = records.len(), "references resolved");
        ReferenceMap { records }
    }

    /// Own segment of every node; the root has none.
    fn segments(&self, table: &NodeTable) -> Vec<String> {
        let mut segments = vec![String::new(); table.len()];
        let retain_order = self.keywords.as_ref().is_none_or(KeywordRules::retain_order);

        for parent in table.iter().filter(|n| n.is_dir()) {
            let mut counter: u32 = 0;
            for &child_id in table.children(parent.id) {
                let child = table.node(child_id);
                let code = if child.is_dir() {
                    self.keywords.as_ref().and_then(|k| k.code_for(&child.name))
                } else {
                    None
                };

                segments[child_id.index()] = match code {
                    Some(code) => {
                        if retain_order {
                            counter += 1;
                        }
                        code
                    }
                    None => {
                        counter += 1;
                        counter.to_string()
                    }
                };
            }
        }
        segments
    }

    /// Walk up the parent chain, prepending ancestor segments.
    fn archive_reference(&self, table: &NodeTable, segments: &[String], id: NodeId) -> String {
        let root = self.catalog.root_reference();
        let delimiter = &self.catalog.delimiter;

        let mut current = match table.lookup_parent(id) {
            ParentLookup::Found(parent) => parent,
            ParentLookup::AtRoot => return root,
        };
        let mut reference = segments[id.index()].clone();

        while let ParentLookup::Found(parent) = table.lookup_parent(current) {
            reference = format!("{}{delimiter}{reference}", segments[current.index()]);
            current = parent;
        }

        format!("{root}{delimiter}{reference}")
    }

    /// Accession references in pre-order.
    fn accession_references(
        &self,
        table: &NodeTable,
        removed: &dyn Fn(&Path) -> bool,
    ) -> Vec<Option<String>> {
        let Some(config) = &self.accession else {
            return vec![None; table.len()];
        };

        let mut counter = AccessionCounter::new(config);
        let mut removed_flags = vec![false; table.len()];
        let mut out = Vec::with_capacity(table.len());

        for node in table.iter() {
            let inherited = node.parent.is_some_and(|p| removed_flags[p.index()]);
            let is_removed = !node.is_root() && (inherited || removed(&node.path));
            removed_flags[node.id.index()] = is_removed;

            out.push((!is_removed).then(|| counter.assign(node.kind)));
        }
        out
    }
}
