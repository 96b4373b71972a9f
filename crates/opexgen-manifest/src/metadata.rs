//! Metadata store binding.
//!
//! The store is a JSON array of row objects keyed by column name, the same
//! shape the reference export writes. Column headers are parsed once into a
//! [`MetadataSchema`]; per-node lookups then only touch typed columns.

use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::DescriptiveSchema;
use crate::error::ManifestError;

pub const FULL_NAME_COLUMN: &str = "FullName";
pub const TITLE_COLUMN: &str = "Title";
pub const DESCRIPTION_COLUMN: &str = "Description";
pub const SECURITY_COLUMN: &str = "Security";
pub const SOURCE_ID_COLUMN: &str = "SourceID";
pub const REMOVALS_COLUMN: &str = "Removals";
pub const IGNORE_COLUMN: &str = "Ignore";
pub const HASH_COLUMN: &str = "Hash";
pub const ALGORITHM_COLUMN: &str = "Algorithm";
pub const ARCHIVE_REFERENCE_COLUMN: &str = "Archive_Reference";
pub const ACCESSION_REFERENCE_COLUMN: &str = "Accession_Reference";

/// Prefix of identifier columns, e.g. `Identifier:isbn`.
pub const IDENTIFIER_PREFIX: &str = "Identifier:";

/// Columns of the reference export that carry no metadata.
const PASSTHROUGH_COLUMNS: &[&str] = &[
    "RelativeName",
    "Basename",
    "Extension",
    "Parent",
    "Kind",
    "Level",
    "SiblingIndex",
    "Size",
    "CreatedAt",
    "ModifiedAt",
    "AccessedAt",
];

/// Meaning of one store column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    FullName,
    Title,
    Description,
    Security,
    SourceId,
    Identifier(String),
    Removals,
    Ignore,
    Hash,
    Algorithm,
    ArchiveReference,
    AccessionReference,
    /// `<schema>:<element/path>` for a configured descriptive schema.
    Descriptive { schema: String, path: Vec<String> },
    /// Known column without metadata meaning.
    Passthrough,
    /// Column that is neither recognised nor passed through.
    Unknown,
}

impl ColumnKind {
    fn classify(header: &str, schemas: &BTreeMap<String, DescriptiveSchema>) -> Self {
        match header {
            FULL_NAME_COLUMN => return Self::FullName,
            TITLE_COLUMN => return Self::Title,
            DESCRIPTION_COLUMN => return Self::Description,
            SECURITY_COLUMN => return Self::Security,
            SOURCE_ID_COLUMN => return Self::SourceId,
            REMOVALS_COLUMN => return Self::Removals,
            IGNORE_COLUMN => return Self::Ignore,
            HASH_COLUMN => return Self::Hash,
            ALGORITHM_COLUMN => return Self::Algorithm,
            ARCHIVE_REFERENCE_COLUMN => return Self::ArchiveReference,
            ACCESSION_REFERENCE_COLUMN => return Self::AccessionReference,
            _ => {}
        }

        if let Some(kind) = header.strip_prefix(IDENTIFIER_PREFIX) {
            if !kind.is_empty() {
                return Self::Identifier(kind.to_string());
            }
        }

        if let Some((schema, path)) = header.split_once(':') {
            let path: Vec<String> = path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if schemas.contains_key(schema) && !path.is_empty() {
                return Self::Descriptive {
                    schema: schema.to_string(),
                    path,
                };
            }
        }

        if PASSTHROUGH_COLUMNS.contains(&header) {
            Self::Passthrough
        } else {
            Self::Unknown
        }
    }
}

/// Typed view of the store's header set.
#[derive(Debug, Clone, Default)]
pub struct MetadataSchema {
    columns: Vec<(String, ColumnKind)>,
}

impl MetadataSchema {
    /// Classify every header once.
    pub fn parse<'a>(
        headers: impl IntoIterator<Item = &'a str>,
        schemas: &BTreeMap<String, DescriptiveSchema>,
    ) -> Self {
        let columns = headers
            .into_iter()
            .map(|h| (h.to_string(), ColumnKind::classify(h, schemas)))
            .collect();
        Self { columns }
    }

    /// Check the columns the run depends on.
    pub fn validate(&self, required: &[String]) -> Result<(), ManifestError> {
        if !self.contains(&ColumnKind::FullName) {
            return Err(ManifestError::missing_column(FULL_NAME_COLUMN));
        }
        match (self.contains(&ColumnKind::Hash), self.contains(&ColumnKind::Algorithm)) {
            (true, false) => return Err(ManifestError::missing_column(ALGORITHM_COLUMN)),
            (false, true) => return Err(ManifestError::missing_column(HASH_COLUMN)),
            _ => {}
        }
        for column in required {
            if !self.has_header(column) {
                return Err(ManifestError::missing_column(column.clone()));
            }
        }
        Ok(())
    }

    /// Check for a column kind.
    pub fn contains(&self, kind: &ColumnKind) -> bool {
        self.columns.iter().any(|(_, k)| k == kind)
    }

    /// Check for a header by name.
    pub fn has_header(&self, header: &str) -> bool {
        self.columns.iter().any(|(h, _)| h == header)
    }

    /// Headers that were not recognised.
    pub fn unknown_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|(_, k)| *k == ColumnKind::Unknown)
            .map(|(h, _)| h.as_str())
    }

    /// All `(header, kind)` pairs in header order.
    pub fn columns(&self) -> &[(String, ColumnKind)] {
        &self.columns
    }
}

/// One descriptive metadata value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptiveValue {
    pub schema: String,
    pub path: Vec<String>,
    pub value: String,
}

/// Metadata bound to one node. Missing values are `None`/`false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub security: Option<String>,
    pub source_id: Option<String>,
    /// `(kind, value)` pairs from `Identifier:<kind>` columns.
    pub identifiers: Vec<(String, String)>,
    pub archive_reference: Option<String>,
    pub accession_reference: Option<String>,
    pub remove: bool,
    pub ignore: bool,
    /// `(algorithm, value)` supplied by the store.
    pub hash: Option<(String, String)>,
    pub descriptive: Vec<DescriptiveValue>,
}

/// Whether a flag cell is set.
pub fn is_truthy(cell: &str) -> bool {
    matches!(
        cell.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "y" | "1" | "x"
    )
}

/// Canonical form of a path used as the store key.
///
/// Paths that no longer exist are normalised lexically.
pub fn normalize_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| {
        path.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    })
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// One store row as read from JSON.
pub type MetadataRow = IndexMap<String, Value>;

/// Rows keyed by normalised full path.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    schema: MetadataSchema,
    rows: HashMap<PathBuf, HashMap<String, String>>,
}

impl MetadataStore {
    /// Load a store from a JSON file.
    pub fn from_json_file(
        path: &Path,
        schemas: &BTreeMap<String, DescriptiveSchema>,
        required: &[String],
    ) -> Result<Self, ManifestError> {
        let data = std::fs::read(path).map_err(|e| ManifestError::io(path, e))?;
        let records: Vec<MetadataRow> =
            serde_json::from_slice(&data).map_err(|e| ManifestError::InvalidStore {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let store = Self::from_records(records, schemas, required)?;
        info!(path = %path.display(), rows = store.len(), "metadata store loaded");
        Ok(store)
    }

    /// Build a store from already parsed rows.
    pub fn from_records(
        records: Vec<MetadataRow>,
        schemas: &BTreeMap<String, DescriptiveSchema>,
        required: &[String],
    ) -> Result<Self, ManifestError> {
        let headers: IndexSet<&str> = records
            .iter()
            .flat_map(|r| r.keys().map(String::as_str))
            .collect();
        let schema = MetadataSchema::parse(headers, schemas);
        schema.validate(required)?;

        let mut rows = HashMap::with_capacity(records.len());
        for record in &records {
            let Some(full_name) = record.get(FULL_NAME_COLUMN).and_then(cell_text) else {
                debug!("skipping metadata row without {FULL_NAME_COLUMN}");
                continue;
            };
            let cells = record
                .iter()
                .filter_map(|(k, v)| cell_text(v).map(|text| (k.clone(), text)))
                .collect();
            rows.insert(normalize_path(Path::new(&full_name)), cells);
        }

        Ok(Self { schema, rows })
    }

    /// The parsed header set.
    pub fn schema(&self) -> &MetadataSchema {
        &self.schema
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the store has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Metadata for a path, or `None` when the store has no row for it.
    pub fn lookup(&self, path: &Path) -> Option<NodeMetadata> {
        let cells = self
            .rows
            .get(path)
            .or_else(|| self.rows.get(&normalize_path(path)))?;

        let mut meta = NodeMetadata::default();
        let mut hash = None;
        let mut algorithm = None;

        for (header, kind) in self.schema.columns() {
            let Some(value) = cells.get(header) else {
                continue;
            };
            match kind {
                ColumnKind::Title => meta.title = Some(value.clone()),
                ColumnKind::Description => meta.description = Some(value.clone()),
                ColumnKind::Security => meta.security = Some(value.clone()),
                ColumnKind::SourceId => meta.source_id = Some(value.clone()),
                ColumnKind::Identifier(id_kind) => {
                    meta.identifiers.push((id_kind.clone(), value.clone()));
                }
                ColumnKind::Removals => meta.remove = is_truthy(value),
                ColumnKind::Ignore => meta.ignore = is_truthy(value),
                ColumnKind::Hash => hash = Some(value.clone()),
                ColumnKind::Algorithm => algorithm = Some(value.clone()),
                ColumnKind::ArchiveReference => meta.archive_reference = Some(value.clone()),
                ColumnKind::AccessionReference => meta.accession_reference = Some(value.clone()),
                ColumnKind::Descriptive { schema, path } => {
                    meta.descriptive.push(DescriptiveValue {
                        schema: schema.clone(),
                        path: path.clone(),
                        value: value.clone(),
                    });
                }
                ColumnKind::FullName | ColumnKind::Passthrough | ColumnKind::Unknown => {}
            }
        }

        meta.hash = algorithm.zip(hash);
        Some(meta)
    }
}
