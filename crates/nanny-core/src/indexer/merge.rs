//! Incremental index merge.
//!
//! Builds a new [`Index`] from the archives currently on disk, carrying over
//! records from the previous catalog whenever the archive's hash is
//! unchanged. Only new or modified archives are opened.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use nanny_schema::{FileHash, Index, NameError, PackageEntry};
use thiserror::Error;

use crate::io::archive::PackageRef;
use crate::io::extract::read_dependencies;

/// Per-run switches for the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Open recomputed archives and read their `.DEP` manifest.
    pub extract_deps: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self { extract_deps: true }
    }
}

/// Counters describing what a merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Records carried over from the previous catalog
    pub reused: usize,
    /// Records built from scratch
    pub recomputed: usize,
    /// Previous records whose archive has disappeared
    pub dropped: usize,
    /// Archives whose manifest could not be read (recorded with no deps)
    pub extract_failures: usize,
}

/// Fatal merge errors.
#[derive(Error, Debug)]
pub enum MergeError {
    /// The archive name cannot be split into name and version.
    #[error("invalid package file {file}: {source}")]
    InvalidName {
        /// Repository-relative path of the archive
        file: String,
        /// Why the split failed
        source: NameError,
    },

    /// A discovered archive lies outside the repository root.
    #[error("{} is not inside repository {}", path.display(), root.display())]
    OutsideRepository {
        /// Archive path
        path: PathBuf,
        /// Repository root
        root: PathBuf,
    },
}

/// Merge freshly discovered archives against the previous catalog.
///
/// For each archive, the previous record is reused verbatim when its stored
/// hash matches the new one (the `unknown` sentinel never matches).
/// Otherwise a new record is built, reading the manifest when
/// `options.extract_deps` is set. A manifest that cannot be read is logged
/// and recorded as no dependencies. Previous records for archives that are
/// no longer present are dropped.
///
/// # Errors
///
/// Returns [`MergeError::InvalidName`] when an archive name has no hyphen,
/// and [`MergeError::OutsideRepository`] when an archive is not under
/// `root`.
pub fn merge_index(
    packages: &[PackageRef],
    root: &Path,
    previous: &Index,
    hashes: &HashMap<PathBuf, FileHash>,
    options: MergeOptions,
) -> Result<(Index, MergeStats), MergeError> {
    let mut index = Index::new();
    let mut stats = MergeStats::default();

    for pkg in packages {
        let file = pkg
            .relative_to(root)
            .ok_or_else(|| MergeError::OutsideRepository {
                path: pkg.path.clone(),
                root: root.to_path_buf(),
            })?;
        if file.trim() != file {
            tracing::warn!("skipping {file:?}: leading whitespace cannot be stored in the index");
            continue;
        }
        let hash = hashes.get(&pkg.path).cloned().unwrap_or_default();

        if let Some(old) = previous.get(&file).filter(|old| old.hash.matches(&hash)) {
            tracing::debug!("unchanged {file}");
            stats.reused += 1;
            index.insert(old.clone());
            continue;
        }

        tracing::debug!("indexing {file} ({})", pkg.format);
        let deps = if options.extract_deps {
            read_dependencies(pkg).unwrap_or_else(|e| {
                tracing::warn!("{e}; recording {file} without dependencies");
                stats.extract_failures += 1;
                Vec::new()
            })
        } else {
            Vec::new()
        };

        let entry = PackageEntry::from_stem(&pkg.stem, file.clone(), hash, deps)
            .map_err(|source| MergeError::InvalidName { file, source })?;
        stats.recomputed += 1;
        index.insert(entry);
    }

    stats.dropped = previous
        .iter()
        .filter(|old| index.get(&old.file).is_none())
        .count();

    Ok((index, stats))
}
