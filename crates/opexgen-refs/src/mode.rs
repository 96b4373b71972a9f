//! Reference modes and their configuration.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::keyword::KeywordConfig;

/// Delimiter between hierarchical segments when none is configured.
pub const DEFAULT_CATALOG_DELIMITER: &str = "/";

/// Delimiter between accession prefix and counter when none is configured.
pub const DEFAULT_ACCESSION_DELIMITER: &str = "-";

/// Which references a run assigns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum RefMode {
    /// Hierarchical archive references only.
    Catalog(CatalogConfig),
    /// Flat accession references only.
    Accession(AccessionConfig),
    /// Both reference kinds.
    Both {
        catalog: CatalogConfig,
        accession: AccessionConfig,
    },
    /// No identifiers; properties are derived from names.
    Generic,
}

impl RefMode {
    /// Catalog settings, if the mode assigns archive references.
    pub fn catalog(&self) -> Option<&CatalogConfig> {
        match self {
            RefMode::Catalog(catalog) | RefMode::Both { catalog, .. } => Some(catalog),
            _ => None,
        }
    }

    /// Accession settings, if the mode assigns accession references.
    pub fn accession(&self) -> Option<&AccessionConfig> {
        match self {
            RefMode::Accession(accession) | RefMode::Both { accession, .. } => Some(accession),
            _ => None,
        }
    }

    /// Short name of the mode.
    pub fn name(&self) -> &'static str {
        match self {
            RefMode::Catalog(_) => "catalog",
            RefMode::Accession(_) => "accession",
            RefMode::Both { .. } => "both",
            RefMode::Generic => "generic",
        }
    }
}

/// Settings for hierarchical archive references.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), default)]
pub struct CatalogConfig {
    /// Prefix standing in for the scan root, e.g. `COLL`.
    #[serde(default)]
    pub prefix: Option<String>,

    /// Separator between segments.
    #[serde(default = "default_catalog_delimiter")]
    pub delimiter: String,

    /// Optional keyword substitution for directory segments.
    #[serde(default)]
    pub keywords: Option<KeywordConfig>,
}

fn default_catalog_delimiter() -> String {
    DEFAULT_CATALOG_DELIMITER.to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            delimiter: default_catalog_delimiter(),
            keywords: None,
        }
    }
}

impl CatalogConfig {
    /// Create a new config builder.
    pub fn builder() -> CatalogConfigBuilder {
        CatalogConfigBuilder::default()
    }

    /// Create a config with the given prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    /// Reference of the scan root: the prefix, or `1` without one.
    pub fn root_reference(&self) -> String {
        self.prefix.clone().unwrap_or_else(|| "1".to_string())
    }
}

/// Which node kinds consume accession numbers.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum AccessionScope {
    /// Files only; directories receive a sentinel.
    #[default]
    File,
    /// Directories only; files receive a sentinel.
    Directory,
    /// Every node.
    Both,
}

/// Settings for flat accession references.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), default)]
pub struct AccessionConfig {
    /// Prefix, e.g. `ACC`; references are then `ACC-1`, `ACC-2`, ...
    #[serde(default)]
    pub prefix: Option<String>,

    /// First number handed out.
    #[serde(default = "default_start_ref")]
    pub start_ref: u64,

    /// Which kinds consume numbers.
    #[serde(default)]
    pub scope: AccessionScope,

    /// Separator between prefix and number.
    #[serde(default = "default_accession_delimiter")]
    pub delimiter: String,
}

fn default_start_ref() -> u64 {
    1
}

fn default_accession_delimiter() -> String {
    DEFAULT_ACCESSION_DELIMITER.to_string()
}

impl Default for AccessionConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            start_ref: default_start_ref(),
            scope: AccessionScope::default(),
            delimiter: default_accession_delimiter(),
        }
    }
}

impl AccessionConfig {
    /// Create a new config builder.
    pub fn builder() -> AccessionConfigBuilder {
        AccessionConfigBuilder::default()
    }

    /// Render the reference for a counter value.
    pub fn format(&self, number: u64) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{}{number}", self.delimiter),
            None => number.to_string(),
        }
    }
}
