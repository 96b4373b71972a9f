//! Archive and accession reference resolution for opexgen.
//!
//! References are computed once per run from the walked [`NodeTable`]:
//!
//! - **Archive references** encode the position of a node in the hierarchy
//!   (`COLL/1/2`), optionally with keyword codes for directories.
//! - **Accession references** are flat, monotonic numbers assigned in
//!   pre-order (`ACC-1`, `ACC-2`, ...).
//!
//! [`NodeTable`]: opexgen_core::NodeTable

mod accession;
mod error;
mod export;
mod keyword;
mod mode;
mod resolver;

pub use accession::{AccessionCounter, DIR_SENTINEL, FILE_SENTINEL};
pub use error::RefsError;
pub use export::{ReferenceRow, export_references, load_references, reference_rows};
pub use keyword::{KeywordCodeStyle, KeywordConfig, KeywordConfigBuilder, KeywordRules, derive_code};
pub use mode::{
    AccessionConfig, AccessionConfigBuilder, AccessionScope, CatalogConfig, CatalogConfigBuilder,
    DEFAULT_ACCESSION_DELIMITER, DEFAULT_CATALOG_DELIMITER, RefMode,
};
pub use resolver::{ReferenceMap, ReferenceRecord, ReferenceResolver};
