//! `annostore`: command-line access to an annotation repository.
//!
//! Reads `annostore.toml` (or the path given with `--config`), opens the
//! snapshot repository and the metadata database, repairs any interrupted
//! writes, then runs one subcommand.
//!
//! # Usage
//!
//! ```
//! annostore project create corpus
//! annostore layers import corpus layers.json
//! annostore document import corpus novel.txt
//! annostore show corpus 1 alice
//! annostore export corpus 1 alice --out ./out
//! ```

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
  sync::Arc,
  time::UNIX_EPOCH,
};

use annostore_core::{
  DocumentRef, Principal, ProjectId, layer::LayerDefinition, validate::StructuralValidator,
};
use annostore_engine::{EngineConfig, FormatRegistry, Repository, UpgradeOutcome};
use annostore_meta_sqlite::SqliteMetadata;
use anyhow::{Context as _, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Annotation snapshot repository")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "annostore.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Repair interrupted writes and exit.
  Reconcile,
  /// Manage projects.
  #[command(subcommand)]
  Project(ProjectCommand),
  /// Manage the custom layers of a project.
  #[command(subcommand)]
  Layers(LayersCommand),
  /// Manage source documents.
  #[command(subcommand)]
  Document(DocumentCommand),
  /// Open a principal's snapshot, creating it if needed, and summarise it.
  Show(Target),
  /// Migrate a stored snapshot to the project's current schema.
  Upgrade(Target),
  /// Export a principal's snapshot.
  Export {
    #[command(flatten)]
    target: Target,
    #[arg(long, default_value = "json")]
    format: String,
    /// Directory the exported file is written to.
    #[arg(long, default_value = ".")]
    out:    PathBuf,
  },
  /// List archived versions of a principal's snapshot.
  History(Target),
  /// Make an archived version live again.
  Restore {
    #[command(flatten)]
    target:    Target,
    /// Archive timestamp as printed by `history`.
    timestamp: i64,
  },
  /// Delete a principal's snapshot.
  Remove(Target),
}

#[derive(Subcommand)]
enum ProjectCommand {
  Create { name: String },
}

#[derive(Subcommand)]
enum LayersCommand {
  /// Add layers from a JSON array of layer definitions.
  Import { project: String, file: PathBuf },
}

#[derive(Subcommand)]
enum DocumentCommand {
  /// Register a source file and create its initial snapshot.
  Import {
    project: String,
    file:    PathBuf,
    #[arg(long, default_value = "text")]
    format:  String,
  },
  /// List the documents of a project.
  List { project: String },
  /// Delete a document with all its snapshots and history.
  Remove { project: String, document: u64 },
}

#[derive(Args)]
struct Target {
  project:   String,
  document:  u64,
  /// User name, or INITIAL_CAS / CORRECTION_USER / CURATION_USER.
  principal: Principal,
}

// ─── Entry point ─────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = EngineConfig::load(&cli.config).context("failed to read configuration")?;
  let metadata = SqliteMetadata::open(&cfg.metadata_path)
    .with_context(|| format!("failed to open metadata at {:?}", cfg.metadata_path))?;
  let store = cfg.snapshot_store().context("invalid repository settings")?;
  let repo = Repository::new(
    store,
    metadata,
    Arc::new(StructuralValidator),
    FormatRegistry::with_defaults(),
  );

  let repaired = repo.reconcile().context("failed to reconcile repository")?;
  if !repaired.is_empty() {
    info!(count = repaired.len(), "repaired interrupted writes");
  }

  run(&repo, cli.command)
}

fn run(repo: &Repository<SqliteMetadata>, command: Command) -> anyhow::Result<()> {
  let meta = repo.metadata();
  match command {
    Command::Reconcile => {
      // Already done at startup.
    }

    Command::Project(ProjectCommand::Create { name }) => {
      let id = meta.create_project(&name)?;
      println!("{id}");
    }

    Command::Layers(LayersCommand::Import { project, file }) => {
      let project = resolve_project(repo, &project)?;
      let raw = std::fs::read(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;
      let layers: Vec<LayerDefinition> =
        serde_json::from_slice(&raw).context("failed to parse layer definitions")?;
      for layer in &layers {
        meta
          .add_layer(project, layer)
          .with_context(|| format!("failed to add layer {}", layer.name))?;
      }
      info!(project = %project, count = layers.len(), "layers imported");
    }

    Command::Document(DocumentCommand::Import { project, file, format }) => {
      let project = resolve_project(repo, &project)?;
      let reader = repo.formats().reader(&format)?;
      let raw = std::fs::read(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;
      let doc = meta.create_document(project, &file_name(&file)?, &format)?;
      if let Err(e) = repo.import_document(doc, &raw, reader.as_ref()) {
        if let Err(cleanup) = repo.remove_document(doc) {
          warn!(document = %doc, error = %cleanup, "failed to clean up after import");
        }
        return Err(e).context("import failed");
      }
      println!("{}", doc.document);
    }

    Command::Document(DocumentCommand::List { project }) => {
      let project = resolve_project(repo, &project)?;
      for doc in meta.list_documents(project)? {
        println!("{}\t{}\t{}\t{}", doc.document.document, doc.name, doc.format, doc.state);
      }
    }

    Command::Document(DocumentCommand::Remove { project, document }) => {
      let project = resolve_project(repo, &project)?;
      repo.remove_document(DocumentRef::new(project.0, document))?;
    }

    Command::Show(target) => {
      let (doc, principal) = resolve(repo, target)?;
      let snapshot = repo.open_for_edit(doc, &principal)?;
      let mut counts = BTreeMap::<&str, usize>::new();
      for object in snapshot.state.objects() {
        *counts.entry(object.type_name.as_str()).or_default() += 1;
      }
      println!("{} characters, {} objects", snapshot.state.text_len(), snapshot.state.len());
      for (type_name, count) in counts {
        println!("  {type_name}\t{count}");
      }
    }

    Command::Upgrade(target) => {
      let (doc, principal) = resolve(repo, target)?;
      match repo.upgrade_schema(doc, &principal)? {
        UpgradeOutcome::Upgraded => println!("upgraded"),
        UpgradeOutcome::AlreadyCurrent => println!("already current"),
      }
    }

    Command::Export { target, format, out } => {
      let (doc, principal) = resolve(repo, target)?;
      let writer = repo.formats().writer(&format)?;
      let export = repo.export(doc, &principal, writer.as_ref())?;
      let path = out.join(&export.file_name);
      std::fs::write(&path, &export.bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
      println!("{}", path.display());
    }

    Command::History(target) => {
      let (doc, principal) = resolve(repo, target)?;
      for entry in repo.history(doc, &principal)? {
        let modified = entry
          .modified
          .duration_since(UNIX_EPOCH)
          .map(|d| d.as_secs())
          .unwrap_or_default();
        println!("{}\t{}\t{}", entry.timestamp, modified, entry.path.display());
      }
    }

    Command::Restore { target, timestamp } => {
      let (doc, principal) = resolve(repo, target)?;
      repo.restore(doc, &principal, timestamp)?;
      info!(document = %doc, principal = %principal, timestamp, "version restored");
    }

    Command::Remove(target) => {
      let (doc, principal) = resolve(repo, target)?;
      if !repo.remove_annotation(doc, &principal)? {
        bail!("no snapshot for {principal} on document {doc}");
      }
    }
  }
  Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn resolve_project(repo: &Repository<SqliteMetadata>, name: &str) -> anyhow::Result<ProjectId> {
  repo
    .metadata()
    .project_by_name(name)?
    .with_context(|| format!("no project named {name:?}"))
}

fn resolve(
  repo: &Repository<SqliteMetadata>,
  target: Target,
) -> anyhow::Result<(DocumentRef, Principal)> {
  let project = resolve_project(repo, &target.project)?;
  Ok((DocumentRef::new(project.0, target.document), target.principal))
}

fn file_name(path: &Path) -> anyhow::Result<String> {
  match path.file_name().and_then(|n| n.to_str()) {
    Some(name) => Ok(name.to_owned()),
    None => bail!("{} has no usable file name", path.display()),
  }
}
