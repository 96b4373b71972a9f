//! Recursive manifest composition.
//!
//! A run walks the tree once, binds store metadata, resolves references,
//! performs confirmed removals and then composes sidecars depth-first:
//! files as soon as they are entered, directories once all of their
//! children are done. The traversal uses an explicit stack of
//! [`Frame`]s so tree depth never turns into call-stack depth.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use opexgen_core::{Node, NodeId, NodeKind, NodeTable, RunWarning, ScanError, WarningKind};
use opexgen_ops::{RemovalLog, remove_empty_directories, remove_tree};
use opexgen_refs::{CatalogConfig, RefMode, ReferenceMap, ReferenceResolver, export_references};
use opexgen_scan::TreeWalker;

use crate::config::ManifestConfig;
use crate::descriptor::{
    DescriptiveBlock, FileEntry, Identifier, Manifest, ManifestDescriptor, Properties,
};
use crate::error::{ManifestError, NodeFailure};
use crate::fixity::{Fixity, FixityAlgorithm, FixityProvider, HashFixityProvider};
use crate::metadata::{MetadataStore, NodeMetadata};
use crate::report::RunReport;
use crate::writer::{PersistOutcome, SidecarStore};
use crate::xml::{DescriptorWriter, XmlDescriptorWriter};

/// Reason logged for paths removed because the store flags them.
pub const REMOVAL_REASON: &str = "flagged for removal";

/// Security descriptor used for name-derived properties.
pub const GENERIC_SECURITY: &str = "open";

/// A subtree the run is about to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalTarget {
    pub id: NodeId,
    pub path: PathBuf,
    pub kind: NodeKind,
}

/// Every removal of a run, presented for confirmation before any of them
/// happens. Only top-most targets are listed; their subtrees go with them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalPlan {
    pub targets: Vec<RemovalTarget>,
}

impl RemovalPlan {
    fn from_flags(table: &NodeTable, flagged: &[bool]) -> Self {
        let mut covered = vec![false; table.len()];
        let mut targets = Vec::new();
        for node in table.iter() {
            let inherited = node.parent.is_some_and(|p| covered[p.index()]);
            let own = flagged[node.id.index()];
            if own && !inherited {
                targets.push(RemovalTarget {
                    id: node.id,
                    path: node.path.clone(),
                    kind: node.kind,
                });
            }
            covered[node.id.index()] = own || inherited;
        }
        Self { targets }
    }

    /// Number of top-most targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if nothing will be removed.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Asked once per run before any flagged path is deleted.
pub trait RemovalConfirmation {
    /// Return `true` to go ahead with the removals.
    fn confirm(&mut self, plan: &RemovalPlan) -> bool;
}

impl<F> RemovalConfirmation for F
where
    F: FnMut(&RemovalPlan) -> bool,
{
    fn confirm(&mut self, plan: &RemovalPlan) -> bool {
        self(plan)
    }
}

/// Traversal step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    /// Process a file, or open a directory and schedule its children.
    Enter(NodeId),
    /// All children of a directory are done; compose it.
    Exit(NodeId),
}

/// Paths of the artefacts a run may write.
#[derive(Debug, Clone)]
struct Artifacts {
    references: PathBuf,
    fixities: PathBuf,
    removals: PathBuf,
}

impl Artifacts {
    fn new(meta_dir: &Path, root: &Path) -> Self {
        let stem = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string());
        Self {
            references: meta_dir.join(format!("{stem}_AutoClass.json")),
            fixities: meta_dir.join(format!("{stem}_Fixities.txt")),
            removals: meta_dir.join(format!("{stem}_Removals.txt")),
        }
    }

    fn all(&self) -> Vec<PathBuf> {
        vec![
            self.references.clone(),
            self.fixities.clone(),
            self.removals.clone(),
        ]
    }
}

/// Composes and writes the sidecars of a tree.
pub struct ManifestComposer {
    config: ManifestConfig,
    fixity: Box<dyn FixityProvider>,
    writer: Box<dyn DescriptorWriter>,
}

impl ManifestComposer {
    /// Create a composer with the default hasher and XML writer.
    pub fn new(config: ManifestConfig) -> Self {
        Self {
            config,
            fixity: Box::new(HashFixityProvider),
            writer: Box::new(XmlDescriptorWriter::default()),
        }
    }

    /// Use a different fixity provider.
    pub fn with_fixity_provider(mut self, provider: impl FixityProvider + 'static) -> Self {
        self.fixity = Box::new(provider);
        self
    }

    /// Use a different descriptor writer.
    pub fn with_writer(mut self, writer: impl DescriptorWriter + 'static) -> Self {
        self.writer = Box::new(writer);
        self
    }

    /// The run configuration.
    pub fn config(&self) -> &ManifestConfig {
        &self.config
    }

    fn canonical_root(&self) -> Result<PathBuf, ManifestError> {
        self.config.check()?;
        fs::canonicalize(&self.config.root)
            .map_err(|e| ManifestError::Scan(ScanError::io(&self.config.root, e)))
    }

    fn load_store(&self, report: &mut RunReport) -> Result<Option<MetadataStore>, ManifestError> {
        let Some(path) = &self.config.metadata_path else {
            return Ok(None);
        };
        let store = MetadataStore::from_json_file(
            path,
            &self.config.descriptive_schemas,
            &self.config.required_columns,
        )?;
        for column in store.schema().unknown_columns() {
            report.warn(RunWarning::new(
                path,
                format!("Unrecognised column '{column}'"),
                WarningKind::UnknownColumn,
            ));
        }
        Ok(Some(store))
    }

    fn walk(
        &self,
        root: &Path,
        artifacts: &Artifacts,
        report: &mut RunReport,
    ) -> Result<NodeTable, ManifestError> {
        let outcome = TreeWalker::new(self.config.walk_config(root, artifacts.all())).walk()?;
        report.warnings.extend(outcome.warnings);
        report.stats = outcome.table.stats().clone();
        Ok(outcome.table)
    }

    /// Walk, resolve and export the reference table without writing
    /// sidecars.
    pub fn classify(&self) -> Result<RunReport, ManifestError> {
        let start = Instant::now();
        let root = self.canonical_root()?;
        let artifacts = Artifacts::new(&self.config.meta_dir(&root), &root);
        let mut report = RunReport::new(&root);

        let table = self.walk(&root, &artifacts, &mut report)?;
        let mode = self
            .config
            .ref_mode
            .clone()
            .unwrap_or_else(|| RefMode::Catalog(CatalogConfig::default()));
        let refs = ReferenceResolver::new(&mode).resolve(&table);
        export_references(&table, &refs, &artifacts.references)?;
        report.references_exported = Some(artifacts.references);

        report.duration = start.elapsed();
        Ok(report)
    }

    /// Walk the tree, bind store rows and work out what the store wants
    /// removed. Reads only.
    fn survey(
        &self,
        root: &Path,
        artifacts: &Artifacts,
        store: Option<&MetadataStore>,
        report: &mut RunReport,
    ) -> Result<Survey, ManifestError> {
        let table = self.walk(root, artifacts, report)?;
        let metadata = bind_metadata(&table, store, report);

        let mut flagged: Vec<bool> = metadata.iter().map(|m| m.remove).collect();
        if flagged[NodeId::ROOT.index()] {
            report.warn(RunWarning::new(
                root,
                "The scan root is flagged for removal and was kept",
                WarningKind::ProtectedRoot,
            ));
            flagged[NodeId::ROOT.index()] = false;
        }
        let plan = RemovalPlan::from_flags(&table, &flagged);
        Ok(Survey {
            table,
            metadata,
            plan,
        })
    }

    /// Run the full pipeline.
    pub fn run(&self, confirmation: &mut dyn RemovalConfirmation) -> Result<RunReport, ManifestError> {
        let start = Instant::now();
        let root = self.canonical_root()?;
        let artifacts = Artifacts::new(&self.config.meta_dir(&root), &root);
        let mut report = RunReport::new(&root);
        let mut removal_log = RemovalLog::with_sink(&artifacts.removals);
        info!(root = %root.display(), "starting run");

        // Schema problems must surface before anything else happens.
        let store = self.load_store(&mut report)?;

        let surveyed_at = report.warnings.len();
        let mut survey = self.survey(&root, &artifacts, store.as_ref(), &mut report)?;
        if !survey.plan.is_empty() && !confirmation.confirm(&survey.plan) {
            return Err(ManifestError::RemovalDeclined(survey.plan.len()));
        }

        // Nothing on disk has changed before this point.
        if self.config.prune_empty && remove_empty_directories(&root, &mut removal_log)? > 0 {
            // Pruning only drops nodes, so the new plan is a subset of the
            // confirmed one.
            report.warnings.truncate(surveyed_at);
            survey = self.survey(&root, &artifacts, store.as_ref(), &mut report)?;
        }
        let Survey {
            table,
            metadata,
            plan,
        } = survey;

        let flagged_paths: HashSet<&Path> = plan.targets.iter().map(|t| t.path.as_path()).collect();
        let is_flagged = |path: &Path| flagged_paths.contains(path);
        let refs = self
            .config
            .ref_mode
            .as_ref()
            .map(|mode| ReferenceResolver::new(mode).resolve_with(&table, &is_flagged));

        if self.config.export_references {
            let exported = match &refs {
                Some(refs) => export_references(&table, refs, &artifacts.references)?,
                None => {
                    let refs = ReferenceResolver::new(&RefMode::Catalog(CatalogConfig::default()))
                        .resolve_with(&table, &is_flagged);
                    export_references(&table, &refs, &artifacts.references)?
                }
            };
            debug!(rows = exported, "reference table written");
            report.references_exported = Some(artifacts.references.clone());
        }

        let sidecars = SidecarStore::new(
            self.config.sidecar_suffix.clone(),
            self.config.force,
            self.config.retry,
        );

        // References are final; the tree may change now.
        let mut removed = vec![false; table.len()];
        for target in &plan.targets {
            remove_tree(&target.path, REMOVAL_REASON, &mut removal_log)?;
            if let Some(sidecar) = orphaned_sidecar(&table, &sidecars, target.id) {
                remove_tree(&sidecar, REMOVAL_REASON, &mut removal_log)?;
            }
            for id in table.subtree(target.id) {
                removed[id.index()] = true;
            }
        }

        let mut context = RunContext {
            config: &self.config,
            table: &table,
            refs: refs.as_ref(),
            metadata: &metadata,
            removed: &removed,
            sidecars: &sidecars,
            fixity: self.fixity.as_ref(),
            writer: self.writer.as_ref(),
            fixity_log: Vec::new(),
            claimed: HashSet::new(),
            report: &mut report,
        };
        context.compose();
        let fixity_log = context.fixity_log;

        if !self.config.fixity.is_empty() && !fixity_log.is_empty() {
            match write_fixity_log(&artifacts.fixities, &fixity_log) {
                Ok(()) => report.fixity_log = Some(artifacts.fixities.clone()),
                Err(e) => report.fail(NodeFailure::new(&artifacts.fixities, e)),
            }
        }

        if !removal_log.is_empty() {
            report.removal_log = removal_log.sink_path().map(Path::to_path_buf);
        }
        report.removed = removal_log.entries().to_vec();
        report.duration = start.elapsed();

        info!(
            written = report.sidecars_written(),
            skipped = report.skipped_existing,
            failed = report.failures.len(),
            "run finished"
        );
        Ok(report)
    }
}

/// Tree, bound metadata and removal plan of one walk.
struct Survey {
    table: NodeTable,
    metadata: Vec<NodeMetadata>,
    plan: RemovalPlan,
}

/// Sidecar a removed file leaves behind. A directory's sidecar goes with the
/// directory; a file named like its parent shares the parent's sidecar and
/// leaves nothing of its own.
fn orphaned_sidecar(table: &NodeTable, sidecars: &SidecarStore, id: NodeId) -> Option<PathBuf> {
    let node = table.node(id);
    if !node.is_file() {
        return None;
    }
    let sidecar = sidecars.sidecar_path(node);
    let shared = node
        .parent
        .is_some_and(|p| sidecars.sidecar_path(table.node(p)) == sidecar);
    (!shared && sidecar.exists()).then_some(sidecar)
}

fn bind_metadata(
    table: &NodeTable,
    store: Option<&MetadataStore>,
    report: &mut RunReport,
) -> Vec<NodeMetadata> {
    let Some(store) = store else {
        return vec![NodeMetadata::default(); table.len()];
    };
    let mut metadata = Vec::with_capacity(table.len());
    for node in table.iter() {
        match store.lookup(&node.path) {
            Some(meta) => metadata.push(meta),
            None => {
                debug!(path = %node.path.display(), "no metadata row");
                report.warn(RunWarning::stale_index(&node.path));
                metadata.push(NodeMetadata::default());
            }
        }
    }
    metadata
}

fn write_fixity_log(path: &Path, fixities: &[Fixity]) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut file = io::BufWriter::new(fs::File::create(path)?);
    for fixity in fixities {
        let target = fixity.path.as_deref().unwrap_or(Path::new(""));
        writeln!(file, "{}\t{}\t{}", fixity.algorithm, fixity.value, target.display())?;
    }
    file.flush()
}

/// State of one composition pass.
struct RunContext<'a> {
    config: &'a ManifestConfig,
    table: &'a NodeTable,
    refs: Option<&'a ReferenceMap>,
    metadata: &'a [NodeMetadata],
    removed: &'a [bool],
    sidecars: &'a SidecarStore,
    fixity: &'a dyn FixityProvider,
    writer: &'a dyn DescriptorWriter,
    fixity_log: Vec<Fixity>,
    /// Sidecar paths taken by a node earlier in this run.
    claimed: HashSet<PathBuf>,
    report: &'a mut RunReport,
}

impl RunContext<'_> {
    fn compose(&mut self) {
        let mut stack = vec![Frame::Enter(NodeId::ROOT)];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(id) => {
                    let node = self.table.node(id);
                    if node.is_file() {
                        self.compose_file(node);
                        continue;
                    }
                    stack.push(Frame::Exit(id));
                    stack.extend(
                        self.table
                            .children(id)
                            .iter()
                            .rev()
                            .filter(|child| !self.removed[child.index()])
                            .map(|&child| Frame::Enter(child)),
                    );
                }
                Frame::Exit(id) => self.compose_directory(self.table.node(id)),
            }
        }
    }

    fn meta(&self, node: &Node) -> &NodeMetadata {
        &self.metadata[node.id.index()]
    }

    fn writes_file_sidecars(&self) -> bool {
        !self.config.fixity.is_empty() || self.config.has_property_source()
    }

    fn compose_file(&mut self, node: &Node) {
        if !self.writes_file_sidecars() {
            return;
        }
        if self.sidecars.should_skip(node) {
            if self.claim(node) {
                self.skip(node);
            }
            return;
        }

        let fixities = match self.fixities(node) {
            Ok(fixities) => fixities,
            Err(e) => {
                warn!(path = %node.path.display(), error = %e, "fixity failed");
                self.report.fail(NodeFailure::new(&node.path, e));
                return;
            }
        };
        let descriptor = ManifestDescriptor {
            manifest: None,
            source_id: self.meta(node).source_id.clone(),
            fixities,
            properties: self.properties(node),
            descriptive: self.descriptive(node),
        };
        if descriptor.is_empty() || !self.claim(node) {
            return;
        }
        self.write(node, descriptor);
    }

    fn compose_directory(&mut self, node: &Node) {
        if !self.claim(node) {
            return;
        }
        if self.sidecars.should_skip(node) {
            self.skip(node);
            return;
        }
        let descriptor = ManifestDescriptor {
            manifest: Some(self.manifest(node)),
            source_id: self.meta(node).source_id.clone(),
            fixities: Vec::new(),
            properties: self.properties(node),
            descriptive: self.descriptive(node),
        };
        self.write(node, descriptor);
    }

    /// Reserve a node's sidecar path. A directory and a file of the same
    /// name inside it map to one path; the second of them fails.
    fn claim(&mut self, node: &Node) -> bool {
        let path = self.sidecars.sidecar_path(node);
        if self.claimed.insert(path.clone()) {
            return true;
        }
        warn!(path = %path.display(), node = %node.path.display(), "sidecar path already taken");
        let message = format!(
            "Sidecar path is already used for another node; {} has no sidecar",
            node.path.display()
        );
        self.report.fail(NodeFailure::new(&path, message));
        false
    }

    fn skip(&mut self, node: &Node) {
        debug!(path = %node.path.display(), "sidecar exists, skipping generation");
        self.report.skipped_existing += 1;
        self.report.warn(RunWarning::new(
            self.sidecars.sidecar_path(node),
            "Sidecar already exists",
            WarningKind::SkippedExisting,
        ));
    }

    fn write(&mut self, node: &Node, descriptor: ManifestDescriptor) {
        let path = self.sidecars.sidecar_path(node);
        let bytes = match self.writer.render(&descriptor) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.report.fail(NodeFailure::new(&path, e));
                return;
            }
        };

        match self.sidecars.persist(&path, &bytes) {
            Ok(PersistOutcome::Written | PersistOutcome::Overwritten) => {
                match node.kind {
                    NodeKind::Directory => self.report.directories_written += 1,
                    NodeKind::File => self.report.files_written += 1,
                }
                self.report.fixities += descriptor.fixities.len() as u64;
                self.fixity_log.extend(descriptor.fixities);
            }
            Ok(PersistOutcome::Skipped) => self.skip(node),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "sidecar write failed");
                self.report.fail(NodeFailure::new(&path, e));
            }
        }
    }

    /// Folder and file lists of a directory.
    fn manifest(&self, node: &Node) -> Manifest {
        let mut manifest = Manifest::default();
        for &child_id in self.table.children(node.id) {
            if self.removed[child_id.index()] {
                continue;
            }
            let child = self.table.node(child_id);
            if self.meta(child).ignore {
                continue;
            }
            match child.kind {
                NodeKind::Directory => manifest.folders.push(child.name.to_string()),
                NodeKind::File => {
                    manifest.files.push(FileEntry::content(child.name.as_str(), child.size));
                    if self.sidecars.sidecar_path(child).exists() {
                        manifest
                            .files
                            .push(FileEntry::metadata(self.sidecars.sidecar_name(child)));
                    }
                }
            }
        }
        manifest
    }

    fn properties(&self, node: &Node) -> Option<Properties> {
        let meta = self.meta(node);
        if !self.config.has_property_source() || meta.ignore {
            return None;
        }

        let mut properties = Properties::default();
        if self.config.uses_generic_properties() {
            let name = if node.is_file() { node.stem() } else { node.name.as_str() };
            properties.title = Some(name.to_string());
            properties.description = Some(name.to_string());
            properties.security = Some(GENERIC_SECURITY.to_string());
        }
        if meta.title.is_some() {
            properties.title = meta.title.clone();
        }
        if meta.description.is_some() {
            properties.description = meta.description.clone();
        }
        if meta.security.is_some() {
            properties.security = meta.security.clone();
        }

        let record = self.refs.and_then(|refs| refs.get(node.id));
        match (&self.config.ref_mode, record) {
            (Some(RefMode::Catalog(_)), Some(record)) => {
                properties.identifiers.push(Identifier::new("code", &record.archive));
            }
            (Some(RefMode::Accession(_)), Some(record)) => {
                if let Some(accession) = &record.accession {
                    properties.identifiers.push(Identifier::new("code", accession));
                }
            }
            (Some(RefMode::Both { .. }), Some(record)) => {
                properties.identifiers.push(Identifier::new("code", &record.archive));
                if let Some(accession) = &record.accession {
                    properties.identifiers.push(Identifier::new("accref", accession));
                }
            }
            (None, _) => {
                if let Some(archive) = &meta.archive_reference {
                    properties.identifiers.push(Identifier::new("code", archive));
                }
                if let Some(accession) = &meta.accession_reference {
                    properties.identifiers.push(Identifier::new("accref", accession));
                }
            }
            _ => {}
        }
        properties.identifiers.extend(
            meta.identifiers
                .iter()
                .map(|(kind, value)| Identifier::new(kind, value)),
        );

        (!properties.is_empty()).then_some(properties)
    }

    fn descriptive(&self, node: &Node) -> Vec<DescriptiveBlock> {
        let meta = self.meta(node);
        if meta.ignore || meta.descriptive.is_empty() {
            return Vec::new();
        }
        DescriptiveBlock::from_values(&meta.descriptive, &self.config.descriptive_schemas)
    }

    fn fixities(&self, node: &Node) -> io::Result<Vec<Fixity>> {
        let supplied = self.meta(node).hash.as_ref();
        let mut fixities = Vec::with_capacity(self.config.fixity.len());
        for &algorithm in &self.config.fixity {
            let verbatim = supplied.and_then(|(name, value)| {
                let matches = name.parse::<FixityAlgorithm>().is_ok_and(|a| a == algorithm);
                matches.then(|| value.clone())
            });
            let value = match verbatim {
                Some(value) => value,
                None => self
                    .config
                    .retry
                    .run(|| self.fixity.digest(&node.path, algorithm))?,
            };
            fixities.push(Fixity::new(algorithm.to_string(), value, node.path.clone()));
        }
        Ok(fixities)
    }
}
