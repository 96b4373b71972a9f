//! Run configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use opexgen_core::{DEFAULT_SIDECAR_SUFFIX, META_DIR_NAME, SortKey, WalkConfig};
use opexgen_ops::RetryPolicy;
use opexgen_refs::RefMode;

use crate::error::ManifestError;
use crate::fixity::FixityAlgorithm;

/// A descriptive metadata schema that store columns may target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptiveSchema {
    /// Namespace URI bound to the schema prefix.
    pub namespace: String,
    /// Local name of the wrapping element; defaults to the prefix.
    #[serde(default)]
    pub root: Option<String>,
}

/// Everything a run needs to know.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ManifestConfig {
    /// Root directory of the tree.
    #[serde(default)]
    pub root: PathBuf,

    /// Include hidden entries.
    #[builder(default)]
    #[serde(default)]
    pub include_hidden: bool,

    /// Order of entries within a directory.
    #[builder(default)]
    #[serde(default)]
    pub sort_key: SortKey,

    /// Glob patterns of names to exclude.
    #[builder(default)]
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Suffix of sidecar documents.
    #[builder(default = "DEFAULT_SIDECAR_SUFFIX.to_string()")]
    #[serde(default = "default_sidecar_suffix")]
    pub sidecar_suffix: String,

    /// Which references are assigned; `None` writes no identifiers.
    #[builder(default)]
    #[serde(default)]
    pub ref_mode: Option<RefMode>,

    /// Derive title, description and security from names.
    #[builder(default)]
    #[serde(default)]
    pub generic_properties: bool,

    /// JSON metadata store.
    #[builder(default)]
    #[serde(default)]
    pub metadata_path: Option<PathBuf>,

    /// Store columns that must be present.
    #[builder(default)]
    #[serde(default)]
    pub required_columns: Vec<String>,

    /// Descriptive schemas by prefix.
    #[builder(default)]
    #[serde(default)]
    pub descriptive_schemas: BTreeMap<String, DescriptiveSchema>,

    /// Fixity algorithms computed for every file.
    #[builder(default)]
    #[serde(default)]
    pub fixity: Vec<FixityAlgorithm>,

    /// Overwrite existing sidecars.
    #[builder(default)]
    #[serde(default)]
    pub force: bool,

    /// Write the reference table to the meta directory.
    #[builder(default)]
    #[serde(default)]
    pub export_references: bool,

    /// Directory receiving the meta directory; defaults to the root.
    #[builder(default)]
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Remove empty directories once flagged removals are confirmed.
    #[builder(default)]
    #[serde(default)]
    pub prune_empty: bool,

    /// Retry policy for sidecar writes and hashing.
    #[builder(default)]
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_sidecar_suffix() -> String {
    DEFAULT_SIDECAR_SUFFIX.to_string()
}

impl ManifestConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            None => return Err("Root path is required".to_string()),
            _ => {}
        }
        if let Some(ref suffix) = self.sidecar_suffix {
            if suffix.is_empty() {
                return Err("Sidecar suffix cannot be empty".to_string());
            }
        }
        Ok(())
    }
}

impl ManifestConfig {
    /// Create a new config builder.
    pub fn builder() -> ManifestConfigBuilder {
        ManifestConfigBuilder::default()
    }

    /// Create a config with defaults for a root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include_hidden: false,
            sort_key: SortKey::default(),
            exclude_patterns: Vec::new(),
            sidecar_suffix: default_sidecar_suffix(),
            ref_mode: None,
            generic_properties: false,
            metadata_path: None,
            required_columns: Vec::new(),
            descriptive_schemas: BTreeMap::new(),
            fixity: Vec::new(),
            force: false,
            export_references: false,
            output_dir: None,
            prune_empty: false,
            retry: RetryPolicy::default(),
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ManifestError> {
        toml::from_str(content).map_err(|e| ManifestError::Config(e.to_string()))
    }

    /// Load a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::io(path, e))?;
        Self::from_toml_str(&content)
    }

    /// Check values that serde cannot.
    pub fn check(&self) -> Result<(), ManifestError> {
        if self.root.as_os_str().is_empty() {
            return Err(ManifestError::Config("Root path is required".to_string()));
        }
        if self.sidecar_suffix.is_empty() {
            return Err(ManifestError::Config("Sidecar suffix cannot be empty".to_string()));
        }
        if self.retry.attempts == 0 {
            return Err(ManifestError::Config("Retry attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Whether any node gets a Properties block.
    pub fn has_property_source(&self) -> bool {
        self.ref_mode.is_some() || self.metadata_path.is_some() || self.generic_properties
    }

    /// Whether title, description and security come from names.
    pub fn uses_generic_properties(&self) -> bool {
        self.generic_properties || matches!(self.ref_mode, Some(RefMode::Generic))
    }

    /// Directory holding run artefacts for a (canonical) root.
    pub fn meta_dir(&self, root: &Path) -> PathBuf {
        self.output_dir
            .as_deref()
            .unwrap_or(root)
            .join(META_DIR_NAME)
    }

    /// Walk settings excluding the given artefact paths.
    pub fn walk_config(&self, root: &Path, excluded_paths: Vec<PathBuf>) -> WalkConfig {
        let mut walk = WalkConfig::new(root);
        walk.include_hidden = self.include_hidden;
        walk.sort_key = self.sort_key;
        walk.exclude_patterns = self.exclude_patterns.clone();
        walk.sidecar_suffix = self.sidecar_suffix.clone();
        walk.excluded_paths = excluded_paths;
        walk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opexgen_refs::CatalogConfig;

    #[test]
    fn test_builder_requires_root() {
        assert!(ManifestConfig::builder().build().is_err());
        let config = ManifestConfig::builder().root("/archive").build().unwrap();
        assert_eq!(config.sidecar_suffix, ".opex");
        assert!(!config.has_property_source());
    }

    #[test]
    fn test_from_toml() {
        let config = ManifestConfig::from_toml_str(
            r#"
            root = "/archive"
            fixity = ["SHA-256", "md5"]
            sort_key = "alphabetical"

            [ref_mode]
            mode = "catalog"
            prefix = "COLL"

            [descriptive_schemas.dc]
            namespace = "http://purl.org/dc/elements/1.1/"

            [retry]
            attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.fixity, vec![FixityAlgorithm::Sha256, FixityAlgorithm::Md5]);
        assert_eq!(config.sort_key, SortKey::Alphabetical);
        assert_eq!(
            config.ref_mode,
            Some(RefMode::Catalog(CatalogConfig::with_prefix("COLL")))
        );
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.retry.base_delay_ms, RetryPolicy::default().base_delay_ms);
        assert!(config.descriptive_schemas.contains_key("dc"));
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_toml_without_root_fails_check() {
        let config = ManifestConfig::from_toml_str("force = true").unwrap();
        assert!(config.check().is_err());
    }

    #[test]
    fn test_meta_dir() {
        let mut config = ManifestConfig::new("/archive");
        assert_eq!(config.meta_dir(Path::new("/archive")), Path::new("/archive/meta"));
        config.output_dir = Some(PathBuf::from("/out"));
        assert_eq!(config.meta_dir(Path::new("/archive")), Path::new("/out/meta"));
    }

    #[test]
    fn test_generic_mode_implies_generic_properties() {
        let mut config = ManifestConfig::new("/archive");
        config.ref_mode = Some(RefMode::Generic);
        assert!(config.uses_generic_properties());
        assert!(config.has_property_source());
    }
}
