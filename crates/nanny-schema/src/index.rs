//! The package catalog and its on-disk text format.
//!
//! A catalog is a sequence of records, one per archive, each laid out as
//!
//! ```text
//! Name: libphonenumber
//! Version: 1.2.0
//! File: libphonenumber-1.2.0.tar.bz2
//! Hash: 5d41402abc4b2a76b9719d911017c592
//! Deps:
//!   tuenti-common < 7.8
//!   tfw-lib > 1.*
//!
//! ```
//!
//! Records are written sorted by `File`. On disk the stream is gzip
//! compressed; [`Index::write_to`] and [`Index::read_from`] work on the
//! plain text.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use thiserror::Error;

use crate::hash::FileHash;
use crate::types::PackageEntry;

const NAME: &str = "Name:";
const VERSION: &str = "Version:";
const FILE: &str = "File:";
const HASH: &str = "Hash:";
const DEPS: &str = "Deps:";

/// Errors raised while reading or persisting a catalog.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Reading, decompressing, or writing the catalog failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A record field appeared out of order.
    #[error("line {line}: expected field \"{expected}\" but got \"{found}\"")]
    UnexpectedField {
        /// 1-based line number in the decompressed stream
        line: usize,
        /// Field tag that should have been there
        expected: &'static str,
        /// The offending line
        found: String,
    },

    /// The stream ended in the middle of a record.
    #[error("line {line}: catalog ends in the middle of a record")]
    Truncated {
        /// 1-based line number where more input was expected
        line: usize,
    },

    /// Two records share the same `File` key.
    #[error("line {line}: duplicate record for '{file}'")]
    DuplicateFile {
        /// Line of the second `File:` field
        line: usize,
        /// The repeated key
        file: String,
    },
}

/// Mapping from repository-relative file path to its catalog record.
///
/// Iteration is always ordered by `File`, which makes the serialized form
/// stable across runs and easy to diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    entries: BTreeMap<String, PackageEntry>,
}

impl Index {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no records.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the record for a repository-relative path.
    pub fn get(&self, file: &str) -> Option<&PackageEntry> {
        self.entries.get(file)
    }

    /// Insert a record keyed by its `file`, returning the one it replaced.
    pub fn insert(&mut self, entry: PackageEntry) -> Option<PackageEntry> {
        self.entries.insert(entry.file.clone(), entry)
    }

    /// Iterate over records in `File` order.
    pub fn iter(&self) -> btree_map::Values<'_, String, PackageEntry> {
        self.entries.values()
    }

    /// Serialize every record as uncompressed text.
    ///
    /// # Errors
    ///
    /// Returns any error produced by the underlying writer.
    pub fn write_to<W: Write>(&self, mut out: W) -> io::Result<()> {
        for entry in self.iter() {
            writeln!(out, "{NAME} {}", entry.name)?;
            writeln!(out, "{VERSION} {}", entry.version)?;
            writeln!(out, "{FILE} {}", entry.file)?;
            writeln!(out, "{HASH} {}", entry.hash)?;
            writeln!(out, "{DEPS}")?;
            for dep in &entry.deps {
                writeln!(out, "  {dep}")?;
            }
            writeln!(out)?;
        }
        out.flush()
    }

    /// Parse uncompressed catalog text.
    ///
    /// End of input where a `Name:` field is expected ends the catalog.
    /// End of input anywhere else is an error.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::UnexpectedField`] for fields out of order,
    /// [`IndexError::Truncated`] for a record cut short,
    /// [`IndexError::DuplicateFile`] when a `File` value repeats, and
    /// [`IndexError::Io`] if the reader fails.
    pub fn read_from<R: BufRead>(input: R) -> Result<Self, IndexError> {
        let mut reader = RecordReader::new(input);
        let mut index = Index::new();

        while let Some(name) = reader.field(NAME)? {
            let version = reader.required_field(VERSION)?;
            let file = reader.required_field(FILE)?;
            let file_line = reader.line;
            let hash = reader.required_field(HASH)?;
            reader.required_field(DEPS)?;
            let deps = reader.deps()?;

            let entry = PackageEntry {
                name,
                version,
                file,
                hash: FileHash::new(hash),
                deps,
            };
            if let Some(previous) = index.insert(entry) {
                return Err(IndexError::DuplicateFile {
                    line: file_line,
                    file: previous.file,
                });
            }
        }

        Ok(index)
    }

    /// Load a gzip-compressed catalog from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or decompressed, or if
    /// its content is not a well-formed catalog (see [`Index::read_from`]).
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let file = File::open(path)?;
        let decoder = MultiGzDecoder::new(BufReader::new(file));
        Self::read_from(BufReader::new(decoder))
    }

    /// Atomically persist the catalog, gzip-compressed, at `path`.
    ///
    /// The data goes to a temporary `.index*` file in the destination
    /// directory which is then renamed over `path`, so readers never see a
    /// partial catalog and a failed write leaves the previous one in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created or written,
    /// or if the final rename fails.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(".index")
            .tempfile_in(dir)?;

        let mut encoder = GzEncoder::new(tmp.as_file_mut(), Compression::default());
        self.write_to(&mut encoder)?;
        encoder.finish()?;
        tmp.as_file().sync_all()?;

        // Temp files are created owner-only; catalogs are meant to be shared.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o644))?;
        }

        tmp.persist(path).map_err(|e| IndexError::Io(e.error))?;
        tracing::debug!("wrote {} records to {}", self.len(), path.display());
        Ok(())
    }
}

impl FromIterator<PackageEntry> for Index {
    fn from_iter<T: IntoIterator<Item = PackageEntry>>(iter: T) -> Self {
        let mut index = Index::new();
        for entry in iter {
            index.insert(entry);
        }
        index
    }
}

impl<'a> IntoIterator for &'a Index {
    type Item = &'a PackageEntry;
    type IntoIter = btree_map::Values<'a, String, PackageEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Line reader that keeps a 1-based line count for error messages.
struct RecordReader<R> {
    inner: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> RecordReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            line: 0,
            buf: String::new(),
        }
    }

    /// Read the next line into `buf`; `false` at end of input.
    fn advance(&mut self) -> io::Result<bool> {
        self.buf.clear();
        if self.inner.read_line(&mut self.buf)? == 0 {
            return Ok(false);
        }
        self.line += 1;
        Ok(true)
    }

    fn field(&mut self, tag: &'static str) -> Result<Option<String>, IndexError> {
        if !self.advance()? {
            return Ok(None);
        }
        let line = self.buf.trim();
        match line.strip_prefix(tag) {
            Some(value) => Ok(Some(value.trim().to_string())),
            None => Err(IndexError::UnexpectedField {
                line: self.line,
                expected: tag,
                found: line.to_string(),
            }),
        }
    }

    fn required_field(&mut self, tag: &'static str) -> Result<String, IndexError> {
        self.field(tag)?.ok_or(IndexError::Truncated {
            line: self.line + 1,
        })
    }

    /// Dependency lines up to (and consuming) the blank separator.
    fn deps(&mut self) -> Result<Vec<String>, IndexError> {
        let mut deps = Vec::new();
        loop {
            if !self.advance()? {
                return Err(IndexError::Truncated {
                    line: self.line + 1,
                });
            }
            let line = self.buf.trim();
            if line.is_empty() {
                return Ok(deps);
            }
            deps.push(line.to_string());
        }
    }
}
