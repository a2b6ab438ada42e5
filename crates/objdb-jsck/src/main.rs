use std::path::PathBuf;

use clap::{Parser, Subcommand};
use objdb::Database;
use objdb_jsck::{check, JsckConfig};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "objdb-jsck", about = "Consistency checker/repair tool for objdb stores")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scans a database's key/value space and reports (optionally repairs)
    /// layout inconsistencies.
    Check {
        /// Path to the backing RocksDB directory.
        path: PathBuf,
        /// Apply fixes as issues are found, instead of only reporting them.
        #[arg(long)]
        repair: bool,
        /// Stop scanning once this many issues have been recorded.
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
        /// Garbage-collect schema versions with no live or historical
        /// object once the scan completes cleanly.
        #[arg(long)]
        gc_schemas: bool,
        /// A path to a file naming additional codecs to register before
        /// validating field encodings (reserved for future extension;
        /// unset uses only the built-in codec registry).
        #[arg(long, value_name = "PATH")]
        registry: Option<PathBuf>,
        /// Treat the database as having this format version instead of
        /// validating the stored one.
        #[arg(long, value_name = "N")]
        force_format_version: Option<u32>,
        #[arg(long)]
        verbose: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Check {
            path,
            repair,
            limit,
            gc_schemas,
            registry,
            force_format_version,
            verbose,
        } => run_check(path, repair, limit, gc_schemas, registry, force_format_version, verbose),
    }
}

#[cfg(feature = "rocksdb-backend")]
fn open_database(path: &std::path::Path) -> anyhow::Result<Database> {
    use objdb::kv::rocks::{RocksKv, RocksdbConfig};
    let kv = std::sync::Arc::new(RocksKv::open(path, RocksdbConfig::default())?);
    Ok(Database::open(kv)?)
}

#[cfg(not(feature = "rocksdb-backend"))]
fn open_database(_path: &std::path::Path) -> anyhow::Result<Database> {
    anyhow::bail!("objdb-jsck was built without the rocksdb-backend feature; rebuild with --features rocksdb-backend to check an on-disk store")
}

fn run_check(
    path: PathBuf,
    repair: bool,
    limit: Option<usize>,
    gc_schemas: bool,
    registry: Option<PathBuf>,
    force_format_version: Option<u32>,
    verbose: bool,
) -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|_| eprintln!("unable to install global tracing subscriber"))
        .ok();

    if let Some(registry_path) = &registry {
        warn!(path = %registry_path.display(), "--registry is not yet wired to a codec-registry loader; using built-in codecs only");
    }

    let db = open_database(&path)?;
    let mut config = JsckConfig::new();
    config.repair = repair;
    config.limit = limit.unwrap_or(usize::MAX);
    config.gc_schemas = gc_schemas;
    config.force_format_version = force_format_version;

    let report = check(&db, &config)?;

    for issue in &report.issues {
        info!(kind = ?issue.kind, key = ?issue.key, "issue");
    }
    if !report.gc_schema_versions.is_empty() {
        info!(versions = ?report.gc_schema_versions, "garbage-collected schema versions");
    }
    if report.truncated {
        warn!("scan stopped early: issue limit reached");
    }

    println!(
        "{} issue(s) found{}",
        report.issues.len(),
        if repair { " (repaired)" } else { "" }
    );

    // Per design doc §6: exit 0 on success even with issues reported;
    // non-zero only on unrecoverable corruption, which surfaces as an Err
    // from `check` above and is reported by `anyhow` before we get here.
    Ok(())
}
