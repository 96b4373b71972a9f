//! Walk configuration types.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Sidecar suffix used when none is configured.
pub const DEFAULT_SIDECAR_SUFFIX: &str = ".opex";

/// Name of the directory that holds run artefacts (exports, logs).
pub const META_DIR_NAME: &str = "meta";

/// Total order applied to the entries of each directory.
///
/// The order seeds every sibling index, so it must be deterministic: names
/// that compare equal after case folding fall back to their raw bytes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum SortKey {
    /// Directories before files, each group case-folded alphabetically.
    #[default]
    FoldersFirst,
    /// Case-folded alphabetical regardless of kind.
    Alphabetical,
}

impl SortKey {
    /// Compare two directory entries.
    pub fn compare(&self, a_name: &str, a_is_dir: bool, b_name: &str, b_is_dir: bool) -> Ordering {
        let by_name = || {
            a_name
                .to_lowercase()
                .cmp(&b_name.to_lowercase())
                .then_with(|| a_name.cmp(b_name))
        };
        match self {
            SortKey::FoldersFirst => b_is_dir.cmp(&a_is_dir).then_with(by_name),
            SortKey::Alphabetical => by_name(),
        }
    }
}

/// Configuration for walking a tree.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct WalkConfig {
    /// Root path to walk.
    pub root: PathBuf,

    /// Include hidden entries (names starting with `.`).
    #[builder(default = "false")]
    #[serde(default)]
    pub include_hidden: bool,

    /// Order of entries within a directory.
    #[builder(default)]
    #[serde(default)]
    pub sort_key: SortKey,

    /// Glob patterns matched against entry names to exclude.
    #[builder(default)]
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Entry names that are never part of the tree.
    #[builder(default = "vec![META_DIR_NAME.to_string()]")]
    #[serde(default = "default_reserved_names")]
    pub reserved_names: Vec<String>,

    /// Suffix of sidecar documents; such files are never nodes themselves.
    #[builder(default = "DEFAULT_SIDECAR_SUFFIX.to_string()")]
    #[serde(default = "default_sidecar_suffix")]
    pub sidecar_suffix: String,

    /// Absolute paths excluded from the walk (output files of the run).
    #[builder(default)]
    #[serde(default)]
    pub excluded_paths: Vec<PathBuf>,
}

fn default_reserved_names() -> Vec<String> {
    vec![META_DIR_NAME.to_string()]
}

fn default_sidecar_suffix() -> String {
    DEFAULT_SIDECAR_SUFFIX.to_string()
}

impl WalkConfigBuilder {
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

impl WalkConfig {
    /// Create a new walk config builder.
    pub fn builder() -> WalkConfigBuilder {
        WalkConfigBuilder::default()
    }

    /// Create a simple config for walking a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include_hidden: false,
            sort_key: SortKey::default(),
            exclude_patterns: Vec::new(),
            reserved_names: default_reserved_names(),
            sidecar_suffix: default_sidecar_suffix(),
            excluded_paths: Vec::new(),
        }
    }

    /// Check if hidden entries should be skipped.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }

    /// Check if a name is reserved or is a sidecar document.
    pub fn is_reserved(&self, name: &str) -> bool {
        name.ends_with(&self.sidecar_suffix) || self.reserved_names.iter().any(|r| r == name)
    }

    /// Check if a path is one of the run's own output files.
    pub fn is_excluded_path(&self, path: &Path) -> bool {
        self.excluded_paths.iter().any(|p| p == path)
    }
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
