//! XACML policy tools
//!
//! Inspect, canonicalize and reference-check policy documents.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use xacml_core::{ArtifactKind, VersionMatch};
use xacml_factory::{FactoryConfig, PolicyArtifact, PolicyFactory, PolicyResolver, PolicyStore};
use xacml_model::PolicyReference;

#[derive(Parser)]
#[command(name = "xacml")]
#[command(about = "XACML policy document tools", long_about = None)]
struct Cli {
    /// Factory configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    /// Require a Policy root
    Policy,
    /// Require a PolicySet root
    PolicySet,
    /// Accept either root
    Infer,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a document's kind, id, version and references
    Inspect {
        /// Policy document
        #[arg(short, long)]
        file: PathBuf,
        /// Expected root kind
        #[arg(short, long, value_enum, default_value_t = KindArg::Infer)]
        kind: KindArg,
    },
    /// Re-emit a document in canonical form
    Canonicalize {
        /// Policy document
        #[arg(short, long)]
        file: PathBuf,
        /// Output path; stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Resolve every reference of a policy set against a directory of documents
    CheckRefs {
        /// Policy set document
        #[arg(short, long)]
        file: PathBuf,
        /// Directory of *.json policy documents
        #[arg(short, long)]
        store: PathBuf,
    },
}

/// Outcome of checking a policy set's references
struct RefReport {
    lines: Vec<String>,
    unresolved: usize,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();
    let cli = Cli::parse();

    let config =
        FactoryConfig::load(cli.config.as_deref()).wrap_err("loading factory configuration")?;
    let factory = PolicyFactory::from_config(&config)?;

    match cli.command {
        Commands::Inspect { file, kind } => {
            print!("{}", inspect(&factory, &file, kind)?);
        }
        Commands::Canonicalize { file, output } => {
            let bytes = canonicalize(&factory, &file)?;
            match output {
                Some(path) => fs::write(&path, &bytes)
                    .wrap_err_with(|| format!("writing {}", path.display()))?,
                None => {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(&bytes)?;
                    writeln!(stdout)?;
                }
            }
        }
        Commands::CheckRefs { file, store } => {
            let report = check_refs(&factory, &file, &store)?;
            for line in &report.lines {
                println!("{line}");
            }
            if report.unresolved > 0 {
                return Err(eyre!(
                    "{} of {} references unresolved",
                    report.unresolved,
                    report.lines.len()
                ));
            }
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("xacml=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn construct(
    factory: &PolicyFactory,
    path: &Path,
    kind: KindArg,
) -> Result<Arc<dyn PolicyArtifact>> {
    let reader = open(path)?;
    let artifact = match kind {
        KindArg::Policy => factory.create_policy(reader),
        KindArg::PolicySet => factory.create_policy_set(reader),
        KindArg::Infer => factory.create(reader, Arc::new(PolicyStore::new())),
    }
    .wrap_err_with(|| format!("constructing {}", path.display()))?;
    Ok(artifact)
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).wrap_err_with(|| format!("opening {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn reference_element(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Policy => "PolicyIdReference",
        ArtifactKind::PolicySet => "PolicySetIdReference",
    }
}

fn describe(reference: &PolicyReference<'_>) -> String {
    let mut text = format!(
        "{} {}",
        reference_element(reference.kind),
        reference.reference.value
    );
    if let Some(version) = &reference.reference.version {
        text.push_str(&format!(" (version {version})"));
    }
    text
}

fn inspect(factory: &PolicyFactory, path: &Path, kind: KindArg) -> Result<String> {
    let artifact = construct(factory, path, kind)?;
    let document = artifact.document();
    let references = document.references();

    let mut out = format!(
        "kind: {}\nid: {}\nversion: {}\nreferences: {}\n",
        artifact.kind(),
        artifact.id(),
        artifact.version(),
        references.len()
    );
    for reference in &references {
        out.push_str(&format!("  {}\n", describe(reference)));
    }
    Ok(out)
}

fn canonicalize(factory: &PolicyFactory, path: &Path) -> Result<Vec<u8>> {
    let artifact = construct(factory, path, KindArg::Infer)?;
    let mut bytes = Vec::new();
    artifact
        .marshal(&mut bytes)
        .wrap_err_with(|| format!("marshalling {}", artifact.id()))?;
    Ok(bytes)
}

fn load_store(factory: &PolicyFactory, dir: &Path) -> Result<PolicyStore> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .wrap_err_with(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let unresolved: Arc<dyn PolicyResolver> = Arc::new(PolicyStore::new());
    let mut store = PolicyStore::new();
    for path in paths {
        let artifact = factory
            .create(open(&path)?, Arc::clone(&unresolved))
            .wrap_err_with(|| format!("constructing {}", path.display()))?;
        debug!(path = %path.display(), id = %artifact.id(), version = %artifact.version(), "Loaded policy document");
        store.insert(artifact)?;
    }
    info!(dir = %dir.display(), count = store.len(), "Loaded policy store");
    Ok(store)
}

fn check_refs(factory: &PolicyFactory, path: &Path, store_dir: &Path) -> Result<RefReport> {
    let store = Arc::new(load_store(factory, store_dir)?);
    let set = factory
        .create_policy_set_with_resolver(open(path)?, Arc::clone(&store) as Arc<dyn PolicyResolver>)
        .wrap_err_with(|| format!("constructing {}", path.display()))?;

    let mut report = RefReport {
        lines: Vec::new(),
        unresolved: 0,
    };
    for reference in set.document().references() {
        let label = describe(&reference);
        let pattern = reference
            .reference
            .version
            .as_deref()
            .map(VersionMatch::parse)
            .transpose()
            .wrap_err_with(|| format!("parsing version of {label}"))?;

        match store.resolve(&reference.reference.value, pattern.as_ref()) {
            Ok(found) if found.kind() == reference.kind => {
                report
                    .lines
                    .push(format!("ok       {label} -> {} {}", found.id(), found.version()));
            }
            Ok(found) => {
                report.unresolved += 1;
                report
                    .lines
                    .push(format!("mismatch {label} -> {} is a {}", found.id(), found.kind()));
            }
            Err(err) => {
                warn!(reference = %label, error = %err, "Unresolved policy reference");
                report.unresolved += 1;
                report.lines.push(format!("missing  {label}: {err}"));
            }
        }
    }
    Ok(report)
}
