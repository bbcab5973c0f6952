//! Package archive classification.
//!
//! A file is a package archive when its base name contains one of the known
//! tar suffixes. The suffix also decides which decoder opens the archive.

use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Compression wrapped around a tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// Bzip2-compressed tar (`.tar.bz2`).
    TarBz2,
    /// Gzip-compressed tar (`.tar.gz` / `.tgz`).
    TarGz,
    /// Xz-compressed tar (`.tar.xz`).
    TarXz,
    /// Zstandard-compressed tar (`.tar.zst`).
    TarZst,
    /// Uncompressed tar (`.tar`).
    Tar,
}

/// Recognized suffixes, in match priority order.
///
/// The first suffix found anywhere in the base name wins, so compressed
/// variants must come before plain `.tar`.
pub const ARCHIVE_SUFFIXES: &[(&str, ArchiveFormat)] = &[
    (".tar.bz2", ArchiveFormat::TarBz2),
    (".tar.gz", ArchiveFormat::TarGz),
    (".tar.xz", ArchiveFormat::TarXz),
    (".tar.zst", ArchiveFormat::TarZst),
    (".tgz", ArchiveFormat::TarGz),
    (".tar", ArchiveFormat::Tar),
];

impl ArchiveFormat {
    /// Short tag for logs (e.g. `tar.gz`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TarBz2 => "tar.bz2",
            Self::TarGz => "tar.gz",
            Self::TarXz => "tar.xz",
            Self::TarZst => "tar.zst",
            Self::Tar => "tar",
        }
    }

    /// Wrap `reader` in the decompressor for this format, yielding the raw
    /// tar stream.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the decoder cannot be initialized.
    pub fn decoder<'a, R: Read + 'a>(self, reader: R) -> io::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Self::TarBz2 => Box::new(bzip2::read::MultiBzDecoder::new(reader)),
            Self::TarGz => Box::new(flate2::read::MultiGzDecoder::new(reader)),
            Self::TarXz => Box::new(xz2::read::XzDecoder::new_multi_decoder(reader)),
            Self::TarZst => Box::new(zstd::stream::read::Decoder::new(reader)?),
            Self::Tar => Box::new(reader),
        })
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A package archive found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    /// Absolute path to the archive
    pub path: PathBuf,
    /// Base name before the archive suffix (e.g. `foo-bar-1.2.3_extra`)
    pub stem: String,
    /// The suffix that matched (e.g. `.tar.gz`)
    pub suffix: &'static str,
    /// Decoder selected by the suffix
    pub format: ArchiveFormat,
}

impl PackageRef {
    /// Path of the archive relative to `root`, `/`-separated.
    ///
    /// Returns `None` if the archive does not live under `root`.
    pub fn relative_to(&self, root: &Path) -> Option<String> {
        let rel = self.path.strip_prefix(root).ok()?;
        let parts: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        Some(parts.join("/"))
    }
}

/// Decide whether `path` names a package archive.
///
/// Returns `None` for names without a recognized suffix, and for names the
/// catalog cannot represent: invalid UTF-8, or leading or trailing
/// whitespace (catalog values are trimmed on read).
pub fn classify(path: &Path) -> Option<PackageRef> {
    let file_name = path.file_name()?.to_str()?;
    if file_name.trim() != file_name {
        return None;
    }

    ARCHIVE_SUFFIXES
        .iter()
        .find_map(|&(suffix, format)| {
            file_name.find(suffix).map(|pos| PackageRef {
                path: path.to_path_buf(),
                stem: file_name[..pos].to_string(),
                suffix,
                format,
            })
        })
}
