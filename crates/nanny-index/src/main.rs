//! `nanny-index` - builds or refreshes the package catalog of a repository.
//!
//! Scans a directory of package archives, reuses records from the existing
//! catalog for archives whose hash has not changed, and writes the catalog
//! back only if something differs.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use nanny_core::indexer::{FileSource, HashAlgorithm, HashMode};
use nanny_core::{IndexConfig, IndexStatus};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nanny-index", version)]
#[command(about = "Generate or update the package index of a repository", long_about = None)]
struct Cli {
    /// Repository directory holding the package archives
    #[arg(env = "NANNY_REPOSITORY")]
    repository: PathBuf,

    /// Gzip-compressed index to update (plain text on stdout when omitted)
    #[arg(env = "NANNY_INDEX")]
    index: Option<PathBuf>,

    /// Read the file list from LIST instead of scanning (implies -n -m)
    #[arg(short = 'f', long, value_name = "LIST", env = "NANNY_FILE_LIST")]
    read_from_file: Option<PathBuf>,

    /// Do not read dependency manifests
    #[arg(short, long, env = "NANNY_NO_DEPS")]
    no_deps: bool,

    /// Do not hash archives; every record gets the `unknown` hash
    #[arg(short = 'm', long, env = "NANNY_NO_HASH", conflicts_with = "hash_command")]
    no_hash: bool,

    /// Walk subdirectories of the repository
    #[arg(short, long, env = "NANNY_RECURSIVE")]
    recursive: bool,

    /// Digest used for in-process hashing (sha256, blake3)
    #[arg(long, env = "NANNY_HASH_ALGORITHM", default_value_t = HashAlgorithm::Sha256)]
    algorithm: HashAlgorithm,

    /// Hash with an external `<prog> FILE...` tool printing `<digest>  <path>` lines
    #[arg(long, value_name = "PROG", env = "NANNY_HASH_COMMAND")]
    hash_command: Option<String>,

    /// Show per-package progress
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> IndexConfig {
        let hash_mode = match (self.no_hash, self.hash_command) {
            (true, _) => HashMode::Fake,
            (false, Some(program)) => HashMode::Command(program),
            (false, None) => HashMode::Digest(self.algorithm),
        };

        let mut config = IndexConfig::new(self.repository);
        config.source = FileSource::Directory {
            recursive: self.recursive,
        };
        config.hash_mode = hash_mode;
        config.extract_deps = !self.no_deps;

        if let Some(path) = self.index {
            config = config.with_index(path);
        }
        if let Some(listing) = self.read_from_file {
            config = config.with_listing(listing);
        }
        config
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = cli.into_config();
    tracing::debug!("{config:?}");

    let outcome = nanny_core::generate(&config).with_context(|| {
        format!(
            "failed to generate index for {}",
            config.repository.display()
        )
    })?;

    if outcome.status == IndexStatus::Updated {
        tracing::debug!("{} packages in index", outcome.index.len());
    }
    eprintln!("  {}", outcome.status.message());

    Ok(())
}
