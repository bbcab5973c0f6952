//! One index generation run and the stages it is built from.

/// Content hashing strategies.
pub mod hashing;
/// Incremental merge of discovered archives against the previous catalog.
pub mod merge;
/// Repository directory traversal utilities.
pub mod walk;

pub use hashing::{ContentHasher, HashAlgorithm, HashMode};
pub use merge::{MergeError, MergeOptions, MergeStats, merge_index};
pub use walk::{DiscoveryError, FileSource, discover_files};

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use nanny_schema::{Index, IndexError};
use thiserror::Error;

use crate::config::IndexConfig;
use crate::io::archive::{PackageRef, classify};

/// Whether a run changed the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    /// A new catalog was written.
    Updated,
    /// The catalog already matched the repository; nothing was written.
    Unchanged,
}

impl IndexStatus {
    /// Status line shown to the user.
    pub fn message(self) -> &'static str {
        match self {
            Self::Updated => "index updated",
            Self::Unchanged => "index unchanged",
        }
    }
}

/// Result of a generation run.
#[derive(Debug)]
pub struct GenerateOutcome {
    /// Whether the catalog was written
    pub status: IndexStatus,
    /// The catalog as it now stands
    pub index: Index,
    /// Merge counters
    pub stats: MergeStats,
}

/// Fatal errors of a generation run.
#[derive(Error, Debug)]
pub enum GenerateError {
    /// The repository path could not be made absolute.
    #[error("invalid repository path {}: {source}", path.display())]
    Repository {
        /// Path as configured
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Listing candidate files failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// An archive could not be turned into a record.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// Persisting the catalog failed; the previous catalog is untouched.
    #[error("failed to write index {}: {source}", path.display())]
    Write {
        /// Catalog path
        path: PathBuf,
        /// Underlying error
        source: IndexError,
    },

    /// Writing the catalog to the output stream failed.
    #[error("failed to write index to output: {0}")]
    Output(#[source] io::Error),
}

/// Load the catalog at `path` for reuse.
///
/// A missing catalog is an empty one. A catalog that cannot be read is
/// reported and also treated as empty, which forces a full rebuild.
pub fn load_previous(path: &Path) -> Index {
    if !path.exists() {
        tracing::info!("no index at {}, building from scratch", path.display());
        return Index::new();
    }

    match Index::load(path) {
        Ok(existing) => {
            tracing::info!("loaded existing index ({} packages)", existing.len());
            existing
        }
        Err(e) => {
            tracing::warn!("existing index broken ({e}), regenerating");
            Index::new()
        }
    }
}

/// Run one generation pass, sending uncompressed output to stdout when no
/// catalog path is configured.
///
/// # Errors
///
/// See [`generate_to`].
pub fn generate(config: &IndexConfig) -> Result<GenerateOutcome, GenerateError> {
    generate_to(config, io::stdout().lock())
}

/// Run one generation pass.
///
/// Discovers and classifies archives, hashes them, merges against the
/// previous catalog and, if the result differs, writes it: atomically and
/// gzip-compressed to `config.index_path`, or as plain text to `out` when
/// no catalog path is set.
///
/// # Errors
///
/// Returns [`GenerateError`] when the repository cannot be listed, an
/// archive name is invalid, or the catalog cannot be written. A broken
/// previous catalog is not an error.
pub fn generate_to<W: Write>(
    config: &IndexConfig,
    out: W,
) -> Result<GenerateOutcome, GenerateError> {
    let root =
        std::path::absolute(&config.repository).map_err(|source| GenerateError::Repository {
            path: config.repository.clone(),
            source,
        })?;

    let files = discover_files(&root, &config.source)?;
    let packages: Vec<PackageRef> = files.iter().filter_map(|path| classify(path)).collect();
    tracing::info!(
        "found {} package archives in {} files",
        packages.len(),
        files.len()
    );

    let paths: Vec<PathBuf> = packages.iter().map(|p| p.path.clone()).collect();
    let hashes = config.hash_mode.hasher().hash_files(&paths);
    tracing::debug!("hashed {} of {} archives", hashes.len(), paths.len());

    let previous = config
        .index_path
        .as_deref()
        .map(load_previous)
        .unwrap_or_default();

    let (index, stats) = merge_index(
        &packages,
        &root,
        &previous,
        &hashes,
        config.merge_options(),
    )?;
    tracing::info!(
        "{} reused, {} recomputed, {} dropped",
        stats.reused,
        stats.recomputed,
        stats.dropped
    );

    if index == previous {
        return Ok(GenerateOutcome {
            status: IndexStatus::Unchanged,
            index,
            stats,
        });
    }

    match &config.index_path {
        Some(path) => index.save(path).map_err(|source| GenerateError::Write {
            path: path.clone(),
            source,
        })?,
        None => index.write_to(out).map_err(GenerateError::Output)?,
    }

    Ok(GenerateOutcome {
        status: IndexStatus::Updated,
        index,
        stats,
    })
}
