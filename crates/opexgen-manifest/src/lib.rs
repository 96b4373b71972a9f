//! OPEX sidecar composition for opexgen.
//!
//! [`ManifestComposer`] drives a whole run: it walks the tree, binds rows of
//! an optional [`MetadataStore`], resolves references, removes flagged
//! subtrees after confirmation and writes one sidecar per directory (and,
//! when there is something to say about them, per file).
//!
//! # Example
//!
//! ```no_run
//! use opexgen_manifest::{ManifestComposer, ManifestConfig, RemovalPlan};
//! use opexgen_refs::{CatalogConfig, RefMode};
//!
//! let mut config = ManifestConfig::new("/archive/accession-42");
//! config.ref_mode = Some(RefMode::Catalog(CatalogConfig::with_prefix("COLL")));
//!
//! let report = ManifestComposer::new(config).run(&mut |_: &RemovalPlan| false)?;
//! println!("{}", report.summary());
//! # Ok::<(), opexgen_manifest::ManifestError>(())
//! ```

mod composer;
mod config;
mod descriptor;
mod error;
mod fixity;
mod metadata;
mod report;
mod writer;
mod xml;

pub use composer::{
    GENERIC_SECURITY, ManifestComposer, REMOVAL_REASON, RemovalConfirmation, RemovalPlan,
    RemovalTarget,
};
pub use config::{DescriptiveSchema, ManifestConfig, ManifestConfigBuilder};
pub use descriptor::{
    DescriptiveBlock, DescriptiveElement, FileEntry, FileEntryKind, Identifier, Manifest,
    ManifestDescriptor, Properties,
};
pub use error::{ManifestError, NodeFailure};
pub use fixity::{Fixity, FixityAlgorithm, FixityProvider, HashFixityProvider};
pub use metadata::{
    ACCESSION_REFERENCE_COLUMN, ALGORITHM_COLUMN, ARCHIVE_REFERENCE_COLUMN, ColumnKind,
    DESCRIPTION_COLUMN, DescriptiveValue, FULL_NAME_COLUMN, HASH_COLUMN, IDENTIFIER_PREFIX,
    IGNORE_COLUMN, MetadataRow, MetadataSchema, MetadataStore, NodeMetadata, REMOVALS_COLUMN,
    SECURITY_COLUMN, SOURCE_ID_COLUMN, TITLE_COLUMN, is_truthy, normalize_path,
};
pub use report::RunReport;
pub use writer::{PersistOutcome, SidecarStore};
pub use xml::{DescriptorWriter, OPEX_NAMESPACE, XmlDescriptorWriter};
