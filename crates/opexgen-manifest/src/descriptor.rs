//! Manifest descriptors: the in-memory shape of one sidecar document.

use serde::{Deserialize, Serialize};

use crate::config::DescriptiveSchema;
use crate::fixity::Fixity;
use crate::metadata::DescriptiveValue;

/// Kind of a file listed in a directory manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileEntryKind {
    /// Archived content.
    Content,
    /// A sidecar document describing a content file.
    Metadata,
}

impl FileEntryKind {
    /// Value of the `type` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Metadata => "metadata",
        }
    }
}

/// A file listed in a directory manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    /// Byte size, present for content entries.
    pub size: Option<u64>,
    pub kind: FileEntryKind,
}

impl FileEntry {
    /// A content entry.
    pub fn content(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size: Some(size),
            kind: FileEntryKind::Content,
        }
    }

    /// A sidecar entry.
    pub fn metadata(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            kind: FileEntryKind::Metadata,
        }
    }
}

/// Children of a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub folders: Vec<String>,
    pub files: Vec<FileEntry>,
}

/// A typed identifier, e.g. `code` → `COLL/1/2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub kind: String,
    pub value: String,
}

impl Identifier {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

/// Descriptive properties of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Properties {
    pub title: Option<String>,
    pub description: Option<String>,
    pub security: Option<String>,
    pub identifiers: Vec<Identifier>,
}

impl Properties {
    /// Check if nothing would be written.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.security.is_none()
            && self.identifiers.is_empty()
    }
}

/// One element of a descriptive metadata block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptiveElement {
    pub name: String,
    pub value: Option<String>,
    pub children: Vec<DescriptiveElement>,
}

impl DescriptiveElement {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
            children: Vec::new(),
        }
    }

    /// Insert a value at a path below this element, merging shared prefixes.
    fn insert(&mut self, path: &[String], value: &str) {
        let Some((head, rest)) = path.split_first() else {
            self.value = Some(value.to_string());
            return;
        };
        let index = match self.children.iter().position(|c| &c.name == head) {
            Some(index) => index,
            None => {
                self.children.push(Self::new(head));
                self.children.len() - 1
            }
        };
        self.children[index].insert(rest, value);
    }
}

/// A namespaced block of descriptive metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptiveBlock {
    /// Namespace prefix.
    pub prefix: String,
    pub namespace: String,
    /// Wrapping element holding the values.
    pub root: DescriptiveElement,
}

impl DescriptiveBlock {
    /// Group values by schema, in the order schemas first appear.
    pub fn from_values(
        values: &[DescriptiveValue],
        schemas: &std::collections::BTreeMap<String, DescriptiveSchema>,
    ) -> Vec<Self> {
        let mut blocks: Vec<Self> = Vec::new();
        for value in values {
            let Some(schema) = schemas.get(&value.schema) else {
                continue;
            };
            let index = match blocks.iter().position(|b| b.prefix == value.schema) {
                Some(index) => index,
                None => {
                    let root = schema.root.as_deref().unwrap_or(value.schema.as_str());
                    blocks.push(Self {
                        prefix: value.schema.clone(),
                        namespace: schema.namespace.clone(),
                        root: DescriptiveElement::new(root),
                    });
                    blocks.len() - 1
                }
            };
            blocks[index].root.insert(&value.path, &value.value);
        }
        blocks
    }
}

/// Everything written to one sidecar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDescriptor {
    /// Children; only directories have a manifest.
    pub manifest: Option<Manifest>,
    pub source_id: Option<String>,
    pub fixities: Vec<Fixity>,
    pub properties: Option<Properties>,
    pub descriptive: Vec<DescriptiveBlock>,
}

impl ManifestDescriptor {
    /// Check if the descriptor carries no information at all.
    pub fn is_empty(&self) -> bool {
        self.manifest.is_none()
            && self.source_id.is_none()
            && self.fixities.is_empty()
            && self.properties.is_none()
            && self.descriptive.is_empty()
    }
}
