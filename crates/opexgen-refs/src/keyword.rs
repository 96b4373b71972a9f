//! Keyword substitution for directory reference segments.
//!
//! A directory whose name contains a configured keyword gets an alphabetic
//! code instead of its numeric sibling index, e.g. `Project Alpha` → `PA`.

use std::collections::BTreeMap;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How a code is derived from a directory name when no explicit code exists.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum KeywordCodeStyle {
    /// First letter of every word.
    #[default]
    Initials,
    /// The first `letters` alphanumeric characters.
    FirstLetters,
}

/// Keyword substitution settings.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), default)]
pub struct KeywordConfig {
    /// Keywords whose code is derived from the directory name.
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Keywords with an explicit code.
    #[serde(default)]
    pub codes: BTreeMap<String, String>,

    /// Derivation used for keywords without an explicit code.
    #[serde(default)]
    pub style: KeywordCodeStyle,

    /// Number of characters for [`KeywordCodeStyle::FirstLetters`].
    #[serde(default = "default_letters")]
    pub letters: usize,

    /// Keyword directories still consume a numeric slot.
    #[serde(default = "default_true")]
    pub retain_order: bool,

    /// Match keywords case-sensitively.
    #[serde(default)]
    pub case_sensitive: bool,
}

fn default_letters() -> usize {
    3
}

fn default_true() -> bool {
    true
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            codes: BTreeMap::new(),
            style: KeywordCodeStyle::default(),
            letters: default_letters(),
            retain_order: true,
            case_sensitive: false,
        }
    }
}

impl KeywordConfig {
    /// Create a new config builder.
    pub fn builder() -> KeywordConfigBuilder {
        KeywordConfigBuilder::default()
    }
}

/// Compiled keyword rules.
#[derive(Debug, Clone)]
pub struct KeywordRules {
    /// (needle, explicit code) in match priority order.
    rules: Vec<(String, Option<String>)>,
    style: KeywordCodeStyle,
    letters: usize,
    case_sensitive: bool,
    retain_order: bool,
}

impl KeywordRules {
    /// Compile rules; explicit codes take priority over derived ones.
    pub fn new(config: &KeywordConfig) -> Self {
        let normalize = |s: &str| {
            if config.case_sensitive {
                s.to_string()
            } else {
                s.to_lowercase()
            }
        };
        let rules = config
            .codes
            .iter()
            .map(|(k, code)| (normalize(k), Some(code.clone())))
            .chain(config.keywords.iter().map(|k| (normalize(k), None)))
            .filter(|(needle, _)| !needle.is_empty())
            .collect();

        Self {
            rules,
            style: config.style,
            letters: config.letters.max(1),
            case_sensitive: config.case_sensitive,
            retain_order: config.retain_order,
        }
    }

    /// Whether keyword directories keep consuming numeric slots.
    pub fn retain_order(&self) -> bool {
        self.retain_order
    }

    /// Code for a directory name, if it matches a keyword.
    pub fn code_for(&self, name: &str) -> Option<String> {
        let haystack = if self.case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        };
        let (_, explicit) = self
            .rules
            .iter()
            .find(|(needle, _)| haystack.contains(needle.as_str()))?;

        let code = match explicit {
            Some(code) => code.clone(),
            None => derive_code(name, self.style, self.letters),
        };
        (!code.is_empty()).then_some(code)
    }
}

/// Derive an upper-case code from a name.
pub fn derive_code(name: &str, style: KeywordCodeStyle, letters: usize) -> String {
    match style {
        KeywordCodeStyle::Initials => name
            .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
            .filter_map(|word| word.chars().find(|c| c.is_alphanumeric()))
            .flat_map(char::to_uppercase)
            .collect(),
        KeywordCodeStyle::FirstLetters => name
            .chars()
            .filter(|c| c.is_alphanumeric())
            .take(letters)
            .flat_map(char::to_uppercase)
            .collect(),
    }
}
