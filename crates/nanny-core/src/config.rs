//! Index generation settings.

use std::path::PathBuf;

use crate::indexer::hashing::HashMode;
use crate::indexer::merge::MergeOptions;
use crate::indexer::walk::FileSource;

/// Everything one index generation run needs, passed explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Repository root holding the package archives
    pub repository: PathBuf,
    /// Catalog to update; `None` writes plain text to the output stream
    pub index_path: Option<PathBuf>,
    /// Where candidate files come from
    pub source: FileSource,
    /// How archives are fingerprinted
    pub hash_mode: HashMode,
    /// Read `.DEP` manifests of new and changed archives
    pub extract_deps: bool,
}

impl IndexConfig {
    /// Defaults for `repository`: flat scan, SHA-256, dependency extraction
    /// on, output to stdout.
    pub fn new(repository: impl Into<PathBuf>) -> Self {
        Self {
            repository: repository.into(),
            index_path: None,
            source: FileSource::default(),
            hash_mode: HashMode::default(),
            extract_deps: true,
        }
    }

    /// Set the catalog path.
    pub fn with_index(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = Some(path.into());
        self
    }

    /// Read the file list from `listing` instead of scanning.
    ///
    /// Listed files need not exist, so this also turns off hashing and
    /// dependency extraction.
    pub fn with_listing(mut self, listing: impl Into<PathBuf>) -> Self {
        self.source = FileSource::Listing(listing.into());
        self.hash_mode = HashMode::Fake;
        self.extract_deps = false;
        self
    }

    /// Options handed to the merge step.
    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            extract_deps: self.extract_deps,
        }
    }
}
