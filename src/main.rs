//! opexgen - archival references and OPEX sidecars for directory trees.
//!
//! Usage:
//!   opexgen generate ROOT    Write sidecars for every directory (and file)
//!   opexgen classify ROOT    Compute and export the reference table only
//!   opexgen clear ROOT       Delete every sidecar below ROOT
//!   opexgen --help           Show help

use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, WrapErr, bail};
use dialoguer::Confirm;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use opexgen_core::{DEFAULT_SIDECAR_SUFFIX, SortKey};
use opexgen_manifest::{
    FixityAlgorithm, ManifestComposer, ManifestConfig, RemovalConfirmation, RemovalPlan, RunReport,
};
use opexgen_ops::clear_sidecars;
use opexgen_refs::{AccessionScope, RefMode};

#[derive(Parser)]
#[command(
    name = "opexgen",
    version,
    about = "Archival reference and OPEX sidecar generator",
    long_about = "opexgen walks a directory tree, assigns archive and accession \
                  references to every node and writes an OPEX sidecar next to each \
                  directory and file.\n\n\
                  Run `opexgen generate ROOT` to write sidecars, or `opexgen classify ROOT` \
                  to inspect the references first."
)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write sidecars for a tree
    Generate {
        #[command(flatten)]
        tree: TreeArgs,

        /// Record fixity with this algorithm (repeatable)
        #[arg(short = 'F', long = "fixity", value_name = "ALG")]
        fixity: Vec<FixityAlgorithm>,

        /// JSON metadata store with per-path overrides and flags
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Derive title, description and security from names
        #[arg(long)]
        generic: bool,

        /// Overwrite existing sidecars
        #[arg(short, long)]
        force: bool,

        /// Delete empty directories once removals are confirmed
        #[arg(long)]
        prune_empty: bool,

        /// Remove flagged paths without asking
        #[arg(short, long)]
        yes: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute and export the reference table without writing sidecars
    Classify {
        #[command(flatten)]
        tree: TreeArgs,
    },

    /// Delete every sidecar below a directory
    Clear {
        /// Root directory
        root: PathBuf,

        /// Sidecar suffix
        #[arg(long, default_value = DEFAULT_SIDECAR_SUFFIX)]
        suffix: String,
    },
}

/// Options shared by every command that walks a tree.
#[derive(Args)]
struct TreeArgs {
    /// Root directory of the tree
    root: PathBuf,

    /// TOML run configuration; flags override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Which references to assign
    #[arg(short, long)]
    mode: Option<Mode>,

    /// Archive reference of the root, e.g. COLL
    #[arg(short, long)]
    prefix: Option<String>,

    /// Accession reference prefix, e.g. ACC
    #[arg(short, long)]
    accession_prefix: Option<String>,

    /// Node kinds that consume accession numbers (file, directory, both)
    #[arg(long)]
    accession_scope: Option<AccessionScope>,

    /// First accession number
    #[arg(long)]
    start_ref: Option<u64>,

    /// Sibling order (folders-first, alphabetical)
    #[arg(short, long)]
    sort: Option<SortKey>,

    /// Include hidden files and directories
    #[arg(long)]
    hidden: bool,

    /// Skip names matching a glob (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,

    /// Directory receiving the meta/ artefacts (defaults to ROOT)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Write the reference table to meta/
    #[arg(short, long)]
    export: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Catalog,
    Accession,
    Both,
    Generic,
}

impl Mode {
    fn of(mode: &RefMode) -> Self {
        match mode {
            RefMode::Catalog(_) => Self::Catalog,
            RefMode::Accession(_) => Self::Accession,
            RefMode::Both { .. } => Self::Both,
            RefMode::Generic => Self::Generic,
        }
    }
}

impl TreeArgs {
    /// Load the config file (if any) and apply the flags on top.
    fn config(&self) -> Result<ManifestConfig> {
        let mut config = match &self.config {
            Some(path) => ManifestConfig::from_toml_file(path)
                .wrap_err_with(|| format!("Invalid config {}", path.display()))?,
            None => ManifestConfig::new(&self.root),
        };
        config.root = self.root.clone();
        config.include_hidden |= self.hidden;
        config.export_references |= self.export;
        config.exclude_patterns.extend(self.exclude.iter().cloned());
        if let Some(sort) = self.sort {
            config.sort_key = sort;
        }
        if self.output.is_some() {
            config.output_dir = self.output.clone();
        }
        config.ref_mode = self.ref_mode(config.ref_mode.take());
        Ok(config)
    }

    fn ref_mode(&self, base: Option<RefMode>) -> Option<RefMode> {
        let mut catalog = base
            .as_ref()
            .and_then(RefMode::catalog)
            .cloned()
            .unwrap_or_default();
        let mut accession = base
            .as_ref()
            .and_then(RefMode::accession)
            .cloned()
            .unwrap_or_default();

        if let Some(prefix) = &self.prefix {
            catalog.prefix = Some(prefix.clone());
        }
        if let Some(prefix) = &self.accession_prefix {
            accession.prefix = Some(prefix.clone());
        }
        if let Some(scope) = self.accession_scope {
            accession.scope = scope;
        }
        if let Some(start) = self.start_ref {
            accession.start_ref = start;
        }

        let mode = self
            .mode
            .or_else(|| base.as_ref().map(Mode::of))
            .or_else(|| self.prefix.as_ref().map(|_| Mode::Catalog))
            .or_else(|| self.accession_prefix.as_ref().map(|_| Mode::Accession))?;

        Some(match mode {
            Mode::Catalog => RefMode::Catalog(catalog),
            Mode::Accession => RefMode::Accession(accession),
            Mode::Both => RefMode::Both { catalog, accession },
            Mode::Generic => RefMode::Generic,
        })
    }
}

/// Asks on the terminal before flagged paths are deleted.
struct PromptConfirmation {
    assume_yes: bool,
}

impl RemovalConfirmation for PromptConfirmation {
    fn confirm(&mut self, plan: &RemovalPlan) -> bool {
        eprintln!("{} path(s) flagged for removal:", plan.len());
        for target in &plan.targets {
            eprintln!("   {} ({})", target.path.display(), target.kind.label());
        }
        if self.assume_yes {
            return true;
        }

        Confirm::new()
            .with_prompt("Delete them and everything below them?")
            .default(false)
            .interact()
            .unwrap_or_else(|e| {
                warn!(error = %e, "could not read confirmation");
                false
            })
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Generate {
            tree,
            fixity,
            input,
            generic,
            force,
            prune_empty,
            yes,
            json,
        } => {
            let mut config = tree.config()?;
            if !fixity.is_empty() {
                config.fixity = fixity;
            }
            if input.is_some() {
                config.metadata_path = input;
            }
            config.generic_properties |= generic;
            config.force |= force;
            config.prune_empty |= prune_empty;
            run_generate(config, yes, json)?;
        }
        Command::Classify { tree } => {
            run_classify(tree.config()?)?;
        }
        Command::Clear { root, suffix } => {
            run_clear(&root, &suffix)?;
        }
    }

    Ok(())
}

/// Install the stderr subscriber. `RUST_LOG` wins over the flags.
fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Run the full pipeline and print the report.
fn run_generate(config: ManifestConfig, assume_yes: bool, json: bool) -> Result<()> {
    eprintln!("Generating sidecars for {}...", config.root.display());

    let composer = ManifestComposer::new(config);
    let mut confirmation = PromptConfirmation { assume_yes };
    let report = composer
        .run(&mut confirmation)
        .wrap_err("Generation aborted")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.is_success() {
        bail!("{} node(s) could not be processed", report.failures.len());
    }
    Ok(())
}

/// Export the reference table only.
fn run_classify(config: ManifestConfig) -> Result<()> {
    eprintln!("Classifying {}...", config.root.display());

    let report = ManifestComposer::new(config)
        .classify()
        .wrap_err("Classification failed")?;

    if let Some(path) = &report.references_exported {
        println!(
            "Exported {} references to {}",
            report.stats.total_files + report.stats.total_dirs + 1,
            path.display()
        );
    }
    print_warnings(&report);
    Ok(())
}

/// Delete sidecars below a root.
fn run_clear(root: &Path, suffix: &str) -> Result<()> {
    let root = root.canonicalize().wrap_err("Invalid path")?;
    let cleared = clear_sidecars(&root, suffix).wrap_err("Clearing sidecars failed")?;
    println!("Removed {} sidecar(s) below {}", cleared.len(), root.display());
    Ok(())
}

fn print_report(report: &RunReport) {
    println!();
    println!("{}", "─".repeat(60));
    println!(
        " {} - {}",
        report.root.display(),
        format_size(report.stats.total_size)
    );
    println!(
        " {} files, {} directories",
        report.stats.total_files, report.stats.total_dirs
    );
    println!(" {}", report.summary());
    if report.fixities > 0 {
        println!(" {} fixity values recorded", report.fixities);
    }
    println!(" Finished in {:.2}s", report.duration.as_secs_f64());
    println!("{}", "─".repeat(60));

    let artefacts = [
        ("References", &report.references_exported),
        ("Fixities", &report.fixity_log),
        ("Removals", &report.removal_log),
    ];
    for (label, path) in artefacts {
        if let Some(path) = path {
            println!(" {:<11} {}", label, path.display());
        }
    }

    if !report.failures.is_empty() {
        println!();
        println!(" Failed:");
        for failure in &report.failures {
            println!("   {}: {}", failure.path.display(), failure.message);
        }
    }
    print_warnings(report);
}

fn print_warnings(report: &RunReport) {
    if !report.warnings.is_empty() {
        println!();
        println!("{} warning(s) during run", report.warnings.len());
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
