//! End-to-end tests for manifest composition.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tempfile::TempDir;

use opexgen_core::WarningKind;
use opexgen_manifest::{
    DescriptiveSchema, DescriptorWriter, FixityAlgorithm, FixityProvider, ManifestComposer,
    ManifestConfig, ManifestDescriptor, ManifestError, REMOVAL_REASON, RemovalPlan,
};
use opexgen_ops::EMPTY_DIRECTORY_REASON;
use opexgen_refs::{AccessionConfig, CatalogConfig, RefMode, load_references};

/// Creates `coll/{A/{a1.txt,a2.txt}, B/b1.txt, c.txt}` and returns the
/// temp dir with the canonical path of `coll`.
fn collection() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("coll");
    fs::create_dir_all(root.join("A")).unwrap();
    fs::create_dir_all(root.join("B")).unwrap();
    fs::write(root.join("A/a1.txt"), "abc").unwrap();
    fs::write(root.join("A/a2.txt"), "hello").unwrap();
    fs::write(root.join("B/b1.txt"), "b").unwrap();
    fs::write(root.join("c.txt"), "c").unwrap();
    let root = fs::canonicalize(root).unwrap();
    (temp, root)
}

fn catalog_config(root: &Path) -> ManifestConfig {
    let mut config = ManifestConfig::new(root);
    config.ref_mode = Some(RefMode::Catalog(CatalogConfig::with_prefix("COLL")));
    config
}

fn write_store(dir: &Path, rows: Value) -> PathBuf {
    let path = dir.join("store.json");
    fs::write(&path, serde_json::to_vec_pretty(&rows).unwrap()).unwrap();
    path
}

fn full_name(path: PathBuf) -> String {
    path.to_string_lossy().into_owned()
}

fn read(path: PathBuf) -> String {
    fs::read_to_string(path).unwrap()
}

fn refuse(_: &RemovalPlan) -> bool {
    false
}

fn accept(_: &RemovalPlan) -> bool {
    true
}

#[test]
fn test_catalog_run_writes_every_sidecar() {
    let (_temp, root) = collection();
    let report = ManifestComposer::new(catalog_config(&root))
        .run(&mut refuse)
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.directories_written, 3);
    assert_eq!(report.files_written, 4);

    let root_opex = read(root.join("coll.opex"));
    assert!(root_opex.contains("<opex:Folder>A</opex:Folder>"));
    assert!(root_opex.contains("<opex:Folder>B</opex:Folder>"));
    assert!(root_opex.contains("<opex:File type=\"content\" size=\"1\">c.txt</opex:File>"));
    assert!(root_opex.contains("<opex:File type=\"metadata\">c.txt.opex</opex:File>"));
    assert!(root_opex.contains("<opex:Identifier type=\"code\">COLL</opex:Identifier>"));

    let a_opex = read(root.join("A/A.opex"));
    assert!(a_opex.contains("<opex:Identifier type=\"code\">COLL/1</opex:Identifier>"));
    assert!(a_opex.contains("<opex:File type=\"content\" size=\"3\">a1.txt</opex:File>"));

    let a2_opex = read(root.join("A/a2.txt.opex"));
    assert!(a2_opex.contains("<opex:Identifier type=\"code\">COLL/1/2</opex:Identifier>"));
    assert!(!a2_opex.contains("opex:Manifest"));
    assert!(read(root.join("c.txt.opex")).contains("COLL/3"));
}

#[test]
fn test_existing_sidecar_is_left_alone() {
    let (_temp, root) = collection();
    fs::write(root.join("A/A.opex"), "keep").unwrap();

    let report = ManifestComposer::new(catalog_config(&root))
        .run(&mut refuse)
        .unwrap();

    assert_eq!(read(root.join("A/A.opex")), "keep");
    assert!(root.join("A/a1.txt.opex").exists());
    assert!(root.join("A/a2.txt.opex").exists());
    assert_eq!(report.skipped_existing, 1);
    assert_eq!(report.warning_count(WarningKind::SkippedExisting), 1);
    assert_eq!(report.directories_written, 2);
}

#[test]
fn test_forced_rerun_is_byte_identical() {
    let (_temp, root) = collection();
    let sidecars = [
        root.join("coll.opex"),
        root.join("A/A.opex"),
        root.join("A/a1.txt.opex"),
        root.join("B/B.opex"),
        root.join("c.txt.opex"),
    ];

    ManifestComposer::new(catalog_config(&root))
        .run(&mut refuse)
        .unwrap();
    let first: Vec<Vec<u8>> = sidecars.iter().map(|p| fs::read(p).unwrap()).collect();

    let mut config = catalog_config(&root);
    config.force = true;
    let report = ManifestComposer::new(config).run(&mut refuse).unwrap();
    let second: Vec<Vec<u8>> = sidecars.iter().map(|p| fs::read(p).unwrap()).collect();

    assert_eq!(first, second);
    assert_eq!(report.skipped_existing, 0);
    assert_eq!(report.sidecars_written(), 7);
}

#[test]
fn test_removal_and_ignore_flags() {
    let (temp, root) = collection();
    let store = write_store(
        temp.path(),
        json!([
            { "FullName": full_name(root.join("B")), "Removals": "true" },
            { "FullName": full_name(root.join("A/a2.txt")), "Ignore": "yes" },
        ]),
    );

    let mut config = ManifestConfig::new(&root);
    config.ref_mode = Some(RefMode::Accession(AccessionConfig {
        prefix: Some("ACC".to_string()),
        ..AccessionConfig::default()
    }));
    config.metadata_path = Some(store);

    let mut offered = Vec::new();
    let report = ManifestComposer::new(config)
        .run(&mut |plan: &RemovalPlan| {
            offered.extend(plan.targets.iter().map(|t| t.path.clone()));
            true
        })
        .unwrap();

    assert_eq!(offered, vec![root.join("B")]);
    assert!(!root.join("B").exists());
    assert_eq!(report.removed.len(), 2);
    assert!(report.removed.iter().all(|e| e.reason == REMOVAL_REASON));

    let log = read(root.join("meta/coll_Removals.txt"));
    assert!(log.contains(&format!("{}\t{REMOVAL_REASON}", root.join("B").display())));
    assert!(log.contains(&root.join("B/b1.txt").display().to_string()));

    let root_opex = read(root.join("coll.opex"));
    assert!(!root_opex.contains("<opex:Folder>B</opex:Folder>"));
    let a_opex = read(root.join("A/A.opex"));
    assert!(a_opex.contains("a1.txt"));
    assert!(!a_opex.contains("a2.txt"));
    assert!(!root.join("A/a2.txt.opex").exists());

    // The removed b1.txt does not consume a number.
    assert!(read(root.join("A/a1.txt.opex")).contains(">ACC-1<"));
    assert!(read(root.join("c.txt.opex")).contains(">ACC-3<"));
}

#[test]
fn test_declined_removal_changes_nothing() {
    let (temp, root) = collection();
    let store = write_store(
        temp.path(),
        json!([{ "FullName": full_name(root.join("B")), "Removals": "x" }]),
    );
    let mut config = catalog_config(&root);
    config.metadata_path = Some(store);

    let err = ManifestComposer::new(config).run(&mut refuse).unwrap_err();

    assert!(matches!(err, ManifestError::RemovalDeclined(1)));
    assert!(root.join("B/b1.txt").exists());
    assert!(!root.join("coll.opex").exists());
    assert!(!root.join("meta").exists());
}

#[test]
fn test_flagged_root_is_kept() {
    let (temp, root) = collection();
    let store = write_store(
        temp.path(),
        json!([{ "FullName": full_name(root.clone()), "Removals": "true" }]),
    );
    let mut config = catalog_config(&root);
    config.metadata_path = Some(store);

    let report = ManifestComposer::new(config).run(&mut refuse).unwrap();

    assert!(root.join("coll.opex").exists());
    assert_eq!(report.warning_count(WarningKind::ProtectedRoot), 1);
    assert!(report.removed.is_empty());
}

#[test]
fn test_fixity_computed_and_taken_from_store() {
    let (temp, root) = collection();
    let store = write_store(
        temp.path(),
        json!([{
            "FullName": full_name(root.join("A/a2.txt")),
            "Hash": "DEADBEEF",
            "Algorithm": "sha256",
        }]),
    );
    let mut config = ManifestConfig::new(&root);
    config.fixity = vec![FixityAlgorithm::Sha256];
    config.metadata_path = Some(store);

    let report = ManifestComposer::new(config).run(&mut refuse).unwrap();

    let a1 = read(root.join("A/a1.txt.opex"));
    assert!(a1.contains(
        "<opex:Fixity type=\"SHA-256\" \
         value=\"BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD\"/>"
    ));
    assert!(read(root.join("A/a2.txt.opex")).contains("value=\"DEADBEEF\""));
    assert_eq!(report.fixities, 4);

    let log = read(root.join("meta/coll_Fixities.txt"));
    assert_eq!(log.lines().count(), 4);
    assert!(log.contains(&format!("SHA-256\tDEADBEEF\t{}", root.join("A/a2.txt").display())));
    assert_eq!(report.fixity_log, Some(root.join("meta/coll_Fixities.txt")));
}

#[test]
fn test_schema_mismatch_fails_before_writing() {
    let (temp, root) = collection();
    let store = write_store(temp.path(), json!([{ "Title": "no path column" }]));
    let mut config = catalog_config(&root);
    config.metadata_path = Some(store);

    let err = ManifestComposer::new(config).run(&mut refuse).unwrap_err();

    assert!(matches!(err, ManifestError::SchemaMismatch { .. }));
    assert!(!root.join("coll.opex").exists());
}

#[test]
fn test_store_properties_and_descriptive_metadata() {
    let (temp, root) = collection();
    let store = write_store(
        temp.path(),
        json!([{
            "FullName": full_name(root.clone()),
            "Title": "Parish records",
            "Archive_Reference": "PR/1",
            "Identifier:isbn": "978-0",
            "dc:creator": "Vestry clerk",
            "Unheard": "of",
        }]),
    );
    let mut config = ManifestConfig::new(&root);
    config.metadata_path = Some(store);
    config.descriptive_schemas.insert(
        "dc".to_string(),
        DescriptiveSchema {
            namespace: "http://purl.org/dc/elements/1.1/".to_string(),
            root: None,
        },
    );

    let report = ManifestComposer::new(config).run(&mut refuse).unwrap();

    let root_opex = read(root.join("coll.opex"));
    assert!(root_opex.contains("<opex:Title>Parish records</opex:Title>"));
    assert!(root_opex.contains("<opex:Identifier type=\"code\">PR/1</opex:Identifier>"));
    assert!(root_opex.contains("<opex:Identifier type=\"isbn\">978-0</opex:Identifier>"));
    assert!(root_opex.contains("<dc:dc xmlns:dc=\"http://purl.org/dc/elements/1.1/\">"));
    assert!(root_opex.contains("<dc:creator>Vestry clerk</dc:creator>"));

    assert_eq!(report.warning_count(WarningKind::UnknownColumn), 1);
    // Every node but the root is missing from the store.
    assert_eq!(report.warning_count(WarningKind::StaleIndexMiss), 6);
}

#[test]
fn test_generic_properties() {
    let (_temp, root) = collection();
    let mut config = ManifestConfig::new(&root);
    config.ref_mode = Some(RefMode::Generic);

    ManifestComposer::new(config).run(&mut refuse).unwrap();

    let a1 = read(root.join("A/a1.txt.opex"));
    assert!(a1.contains("<opex:Title>a1</opex:Title>"));
    assert!(a1.contains("<opex:SecurityDescriptor>open</opex:SecurityDescriptor>"));
    assert!(!a1.contains("opex:Identifier"));
    assert!(read(root.join("A/A.opex")).contains("<opex:Description>A</opex:Description>"));
}

#[test]
fn test_plain_run_writes_directory_sidecars_only() {
    let (_temp, root) = collection();
    let report = ManifestComposer::new(ManifestConfig::new(&root))
        .run(&mut refuse)
        .unwrap();

    assert_eq!(report.directories_written, 3);
    assert_eq!(report.files_written, 0);
    assert!(!root.join("c.txt.opex").exists());
    assert!(!read(root.join("coll.opex")).contains("type=\"metadata\""));
}

#[test]
fn test_prune_empty_directories() {
    let (_temp, root) = collection();
    fs::create_dir_all(root.join("Empty/Inner")).unwrap();
    let mut config = catalog_config(&root);
    config.prune_empty = true;

    let report = ManifestComposer::new(config).run(&mut accept).unwrap();

    assert!(!root.join("Empty").exists());
    assert_eq!(report.removed.len(), 2);
    assert!(report.removed.iter().all(|e| e.reason == EMPTY_DIRECTORY_REASON));
    assert!(!read(root.join("coll.opex")).contains("Empty"));
}

#[test]
fn test_export_references_skips_artifacts() {
    let (_temp, root) = collection();
    let mut config = catalog_config(&root);
    config.export_references = true;

    let composer = ManifestComposer::new(config);
    let report = composer.run(&mut refuse).unwrap();
    let exported = report.references_exported.unwrap();
    assert_eq!(exported, root.join("meta/coll_AutoClass.json"));
    assert_eq!(load_references(&exported).unwrap().len(), 7);

    // A second pass must not pick up its own artefacts.
    let report = composer.classify().unwrap();
    assert_eq!(report.stats.total_files, 4);
    assert_eq!(load_references(&exported).unwrap().len(), 7);
}

#[test]
fn test_declined_removal_prunes_nothing() {
    let (temp, root) = collection();
    fs::create_dir(root.join("Empty")).unwrap();
    let store = write_store(
        temp.path(),
        json!([{ "FullName": full_name(root.join("B")), "Removals": "true" }]),
    );
    let mut config = catalog_config(&root);
    config.metadata_path = Some(store);
    config.prune_empty = true;

    let err = ManifestComposer::new(config).run(&mut refuse).unwrap_err();

    assert!(matches!(err, ManifestError::RemovalDeclined(1)));
    assert!(root.join("Empty").is_dir());
    assert!(root.join("B/b1.txt").exists());
    assert!(!root.join("meta/coll_Removals.txt").exists());
    assert!(!root.join("meta").exists());
}

#[test]
fn test_pruned_flagged_directory_is_not_removed_twice() {
    let (temp, root) = collection();
    fs::create_dir(root.join("Empty")).unwrap();
    let store = write_store(
        temp.path(),
        json!([{ "FullName": full_name(root.join("Empty")), "Removals": "true" }]),
    );
    let mut config = catalog_config(&root);
    config.metadata_path = Some(store);
    config.prune_empty = true;

    let report = ManifestComposer::new(config).run(&mut accept).unwrap();

    assert!(!root.join("Empty").exists());
    assert_eq!(report.removed.len(), 1);
    assert_eq!(report.removed[0].reason, EMPTY_DIRECTORY_REASON);
    assert!(report.is_success());
}

#[test]
fn test_directory_and_file_sharing_a_sidecar_path() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("coll");
    fs::create_dir_all(root.join("A")).unwrap();
    fs::write(root.join("A/A"), "same name as its folder").unwrap();
    let root = fs::canonicalize(root).unwrap();

    let report = ManifestComposer::new(catalog_config(&root))
        .run(&mut refuse)
        .unwrap();

    // The file is composed first and keeps the path.
    let shared = read(root.join("A/A.opex"));
    assert!(shared.contains("COLL/1/1"));
    assert!(!shared.contains("opex:Manifest"));

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, root.join("A/A.opex"));
    assert!(report.failures[0].message.contains(&root.join("A").display().to_string()));
    assert_eq!(report.skipped_existing, 0);
    assert_eq!(report.directories_written, 1);
    assert_eq!(report.files_written, 1);
    assert!(!report.is_success());
}

#[test]
fn test_ignored_directory_is_still_descended() {
    let (temp, root) = collection();
    let store = write_store(
        temp.path(),
        json!([{ "FullName": full_name(root.join("A")), "Ignore": "true" }]),
    );
    let mut config = catalog_config(&root);
    config.metadata_path = Some(store);

    let report = ManifestComposer::new(config).run(&mut refuse).unwrap();
    assert!(report.is_success());

    let root_opex = read(root.join("coll.opex"));
    assert!(!root_opex.contains("<opex:Folder>A</opex:Folder>"));
    assert!(root_opex.contains("<opex:Folder>B</opex:Folder>"));

    let a_opex = read(root.join("A/A.opex"));
    assert!(!a_opex.contains("opex:Properties"));
    assert!(a_opex.contains("<opex:File type=\"content\" size=\"3\">a1.txt</opex:File>"));

    assert!(read(root.join("A/a1.txt.opex")).contains("COLL/1/1"));
    assert!(root.join("A/a2.txt.opex").exists());
}

#[test]
fn test_removed_file_takes_its_sidecar_along() {
    let (temp, root) = collection();
    fs::write(root.join("c.txt.opex"), "<stale/>").unwrap();
    let store = write_store(
        temp.path(),
        json!([{ "FullName": full_name(root.join("c.txt")), "Removals": "true" }]),
    );
    let mut config = catalog_config(&root);
    config.metadata_path = Some(store);

    let report = ManifestComposer::new(config).run(&mut accept).unwrap();

    assert!(!root.join("c.txt").exists());
    assert!(!root.join("c.txt.opex").exists());
    let removed: Vec<PathBuf> = report.removed.iter().map(|e| e.path.clone()).collect();
    assert_eq!(removed, vec![root.join("c.txt"), root.join("c.txt.opex")]);
    assert!(read(root.join("meta/coll_Removals.txt")).contains("c.txt.opex"));
    assert!(!read(root.join("coll.opex")).contains("c.txt"));
}

/// Answers every file with a fixed value, except files named `a1.txt`.
struct FixedFixity;

impl FixityProvider for FixedFixity {
    fn digest(&self, path: &Path, _algorithm: FixityAlgorithm) -> io::Result<String> {
        if path.ends_with("a1.txt") {
            return Err(io::Error::other("unreadable"));
        }
        Ok("F1XED".to_string())
    }
}

#[test]
fn test_custom_fixity_provider() {
    let (_temp, root) = collection();
    let mut config = ManifestConfig::new(&root);
    config.fixity = vec![FixityAlgorithm::Md5];

    let report = ManifestComposer::new(config)
        .with_fixity_provider(FixedFixity)
        .run(&mut refuse)
        .unwrap();

    assert!(read(root.join("c.txt.opex")).contains("value=\"F1XED\""));
    assert!(!root.join("A/a1.txt.opex").exists());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, root.join("A/a1.txt"));
    assert_eq!(report.files_written, 3);
}

/// Renders only the folder list of a directory.
struct FolderListWriter;

impl DescriptorWriter for FolderListWriter {
    fn render(&self, descriptor: &ManifestDescriptor) -> Result<Vec<u8>, ManifestError> {
        let folders = descriptor
            .manifest
            .as_ref()
            .map(|m| m.folders.join(","))
            .unwrap_or_default();
        Ok(folders.into_bytes())
    }
}

#[test]
fn test_custom_descriptor_writer() {
    let (_temp, root) = collection();

    ManifestComposer::new(ManifestConfig::new(&root))
        .with_writer(FolderListWriter)
        .run(&mut refuse)
        .unwrap();

    assert_eq!(read(root.join("coll.opex")), "A,B");
    assert_eq!(read(root.join("A/A.opex")), "");
}
