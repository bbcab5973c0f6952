//! Repository traversal utilities.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Where the list of candidate files comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Scan the repository directory.
    Directory {
        /// Descend into subdirectories
        recursive: bool,
    },
    /// Read repository-relative paths, one per line, from a listing file.
    Listing(PathBuf),
}

impl Default for FileSource {
    fn default() -> Self {
        Self::Directory { recursive: false }
    }
}

/// Errors raised while listing candidate files.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The repository directory could not be read.
    #[error("cannot read repository {}: {source}", path.display())]
    Repository {
        /// Repository root
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// The listing file could not be read.
    #[error("cannot read file list {}: {source}", path.display())]
    Listing {
        /// Listing file path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },
}

/// List candidate files under `root`, sorted.
///
/// # Errors
///
/// Returns [`DiscoveryError`] if the repository directory or the listing
/// file cannot be read.
pub fn discover_files(root: &Path, source: &FileSource) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut files = match source {
        FileSource::Directory { recursive: false } => list_flat(root)?,
        FileSource::Directory { recursive: true } => list_recursive(root)?,
        FileSource::Listing(listing) => list_from_file(root, listing)?,
    };
    files.sort();
    Ok(files)
}

fn list_flat(root: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let entries = fs::read_dir(root).map_err(|source| DiscoveryError::Repository {
        path: root.to_path_buf(),
        source,
    })?;

    Ok(entries
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect())
}

fn list_recursive(root: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root) {
        match entry {
            Ok(e) => {
                if e.path().is_file() {
                    files.push(e.into_path());
                }
            }
            // An unreadable root must not look like an empty repository.
            Err(e) if e.depth() == 0 => {
                return Err(DiscoveryError::Repository {
                    path: root.to_path_buf(),
                    source: e.into(),
                });
            }
            Err(e) => tracing::warn!("skipping unreadable path: {e}"),
        }
    }
    Ok(files)
}

fn list_from_file(root: &Path, listing: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let content = fs::read_to_string(listing).map_err(|source| DiscoveryError::Listing {
        path: listing.to_path_buf(),
        source,
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| root.join(line))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn flat_listing_skips_directories_and_subtrees() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b-1.tar.gz"));
        touch(&root.join("a-1.tar.gz"));
        touch(&root.join("sub/c-1.tar.gz"));

        let files = discover_files(root, &FileSource::default()).unwrap();
        assert_eq!(files, [root.join("a-1.tar.gz"), root.join("b-1.tar.gz")]);
    }

    #[test]
    fn recursive_listing_finds_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("a-1.tar.gz"));
        touch(&root.join("sub/deeper/c-1.tar.gz"));

        let files = discover_files(root, &FileSource::Directory { recursive: true }).unwrap();
        assert_eq!(
            files,
            [root.join("a-1.tar.gz"), root.join("sub/deeper/c-1.tar.gz")]
        );
    }

    #[test]
    fn listing_file_is_joined_onto_root() {
        let dir = tempfile::tempdir().unwrap();
        let listing = dir.path().join("files.txt");
        fs::write(&listing, "  x/a-1.tar.gz\n\nb-2.tar.bz2  \n").unwrap();

        let root = Path::new("/srv/repo");
        let files = discover_files(root, &FileSource::Listing(listing)).unwrap();
        assert_eq!(
            files,
            [root.join("b-2.tar.bz2"), root.join("x/a-1.tar.gz")]
        );
    }

    #[test]
    fn missing_repository_is_an_error() {
        let err = discover_files(Path::new("/definitely/not/here"), &FileSource::default());
        assert!(matches!(err, Err(DiscoveryError::Repository { .. })));
    }

    #[test]
    fn missing_repository_is_an_error_when_recursive() {
        let err = discover_files(
            Path::new("/definitely/not/here"),
            &FileSource::Directory { recursive: true },
        );
        assert!(matches!(err, Err(DiscoveryError::Repository { .. })));
    }
}
