//! Flat reference table export.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use opexgen_core::{NodeKind, NodeTable};

use crate::error::RefsError;
use crate::resolver::ReferenceMap;

/// One row of the exported reference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReferenceRow {
    pub full_name: PathBuf,
    pub relative_name: String,
    pub basename: String,
    pub extension: String,
    pub parent: Option<PathBuf>,
    pub kind: NodeKind,
    pub level: u32,
    pub sibling_index: u32,
    pub size: u64,
    pub created_at: Option<String>,
    pub modified_at: String,
    pub accessed_at: Option<String>,
    #[serde(rename = "Archive_Reference")]
    pub archive_reference: String,
    #[serde(rename = "Accession_Reference", skip_serializing_if = "Option::is_none", default)]
    pub accession_reference: Option<String>,
}

fn rfc3339(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}

/// Build export rows for every node of the table.
pub fn reference_rows(table: &NodeTable, refs: &ReferenceMap) -> Vec<ReferenceRow> {
    let root = table.root().path.clone();
    let root_parent = root.parent().map(Path::to_path_buf);

    table
        .iter()
        .map(|node| {
            let record = refs.get(node.id).cloned().unwrap_or_default();
            let relative = node
                .path
                .strip_prefix(&root)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            let parent = match node.parent {
                Some(parent) => Some(table.node(parent).path.clone()),
                None => root_parent.clone(),
            };

            ReferenceRow {
                full_name: node.path.clone(),
                relative_name: relative,
                basename: node.stem().to_string(),
                extension: node.extension().to_string(),
                parent,
                kind: node.kind,
                level: node.level,
                sibling_index: node.sibling_index,
                size: node.size,
                created_at: node.timestamps.created.map(rfc3339),
                modified_at: rfc3339(node.timestamps.modified),
                accessed_at: node.timestamps.accessed.map(rfc3339),
                archive_reference: record.archive,
                accession_reference: record.accession,
            }
        })
        .collect()
}

/// Write the reference table as pretty-printed JSON.
pub fn export_references(
    table: &NodeTable,
    refs: &ReferenceMap,
    path: &Path,
) -> Result<usize, RefsError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| RefsError::io(dir, e))?;
    }

    let rows = reference_rows(table, refs);
    let file = File::create(path).map_err(|e| RefsError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &rows)?;
    writer.flush().map_err(|e| RefsError::io(path, e))?;

    info!(path = %path.display(), rows = rows.len(), "reference table exported");
    Ok(rows.len())
}

/// Read a previously exported reference table.
pub fn load_references(path: &Path) -> Result<Vec<ReferenceRow>, RefsError> {
    let data = std::fs::read(path).map_err(|e| RefsError::io(path, e))?;
    Ok(serde_json::from_slice(&data)?)
}
