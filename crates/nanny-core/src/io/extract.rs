//! Dependency manifest extraction
//!
//! Streams a package archive looking for its embedded `./.DEP` manifest.
//! Nothing is unpacked to disk.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use nanny_schema::MANIFEST_MEMBER;
use thiserror::Error;

use crate::io::archive::{ArchiveFormat, PackageRef};

/// Errors raised while reading a manifest out of an archive.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The archive file could not be opened.
    #[error("failed to open {}: {source}", path.display())]
    Open {
        /// Archive path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// The archive is corrupt or not in its declared format.
    #[error("failed to read archive {}: {source}", path.display())]
    Archive {
        /// Archive path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },
}

/// Read and parse the dependency manifest of a package archive.
///
/// An archive without a manifest has no dependencies; that is not an error.
///
/// # Errors
///
/// Returns [`ExtractError`] if the archive cannot be opened or is not a
/// readable archive of its declared format.
pub fn read_dependencies(pkg: &PackageRef) -> Result<Vec<String>, ExtractError> {
    let manifest = read_member(&pkg.path, pkg.format, Path::new(MANIFEST_MEMBER))?;
    Ok(manifest.as_deref().map(parse_manifest).unwrap_or_default())
}

/// Stream `archive_path` and return the text of the first member named
/// `member`, or `None` if the archive has no such member.
///
/// A leading `./` on either side is ignored when comparing names. Invalid
/// UTF-8 in the member is replaced rather than rejected.
///
/// # Errors
///
/// Returns [`ExtractError::Open`] if the file cannot be opened and
/// [`ExtractError::Archive`] if decompression or tar parsing fails.
pub fn read_member(
    archive_path: &Path,
    format: ArchiveFormat,
    member: &Path,
) -> Result<Option<String>, ExtractError> {
    let file = File::open(archive_path).map_err(|source| ExtractError::Open {
        path: archive_path.to_path_buf(),
        source,
    })?;

    scan_tar(file, format, member).map_err(|source| ExtractError::Archive {
        path: archive_path.to_path_buf(),
        source,
    })
}

fn scan_tar(file: File, format: ArchiveFormat, member: &Path) -> io::Result<Option<String>> {
    let decoder = format.decoder(BufReader::new(file))?;
    let mut archive = tar::Archive::new(decoder);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let found = same_member(&entry.path()?, member);
        if !found {
            continue;
        }

        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        return Ok(Some(String::from_utf8_lossy(&content).into_owned()));
    }

    Ok(None)
}

fn same_member(a: &Path, b: &Path) -> bool {
    fn normal(p: &Path) -> Vec<Component<'_>> {
        p.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    }
    normal(a) == normal(b)
}

/// Parse manifest text into dependency declarations.
///
/// Blank lines and `#` comments are skipped; every other line is trimmed and
/// kept in order. Inner whitespace is preserved.
pub fn parse_manifest(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::archive::classify;
    use std::io::Write;

    /// Build a tar stream with member names stored verbatim (`./` kept).
    fn tar_bytes(members: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in members {
            let mut header = tar::Header::new_gnu();
            header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, data.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn write_archive(dir: &Path, name: &str, members: &[(&str, &str)]) -> PackageRef {
        let path = dir.join(name);
        let pkg = classify(&path).unwrap();
        let raw = tar_bytes(members);
        let bytes = match pkg.format {
            ArchiveFormat::Tar => raw,
            ArchiveFormat::TarGz => {
                let mut enc =
                    flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
                enc.write_all(&raw).unwrap();
                enc.finish().unwrap()
            }
            ArchiveFormat::TarBz2 => {
                let mut enc =
                    bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
                enc.write_all(&raw).unwrap();
                enc.finish().unwrap()
            }
            ArchiveFormat::TarXz => {
                let mut enc = xz2::write::XzEncoder::new(Vec::new(), 6);
                enc.write_all(&raw).unwrap();
                enc.finish().unwrap()
            }
            ArchiveFormat::TarZst => zstd::encode_all(&raw[..], 0).unwrap(),
        };
        std::fs::write(&path, bytes).unwrap();
        pkg
    }

    #[test]
    fn parses_comments_and_blank_lines() {
        let deps = parse_manifest("# comment\n\nlibfoo >= 1.0\n  libbar\n");
        assert_eq!(deps, ["libfoo >= 1.0", "libbar"]);
    }

    #[test]
    fn indented_comment_is_skipped() {
        let deps = parse_manifest("   # indented\r\nlib  a  b\t\n#x\n");
        assert_eq!(deps, ["lib  a  b"]);
    }

    #[test]
    fn reads_manifest_from_every_format() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "p-1.tar",
            "p-1.tar.gz",
            "p-1.tgz",
            "p-1.tar.bz2",
            "p-1.tar.xz",
            "p-1.tar.zst",
        ] {
            let pkg = write_archive(
                dir.path(),
                name,
                &[
                    ("./bin/tool", "#!/bin/sh\n"),
                    ("./.DEP", "# deps\nlibfoo >= 1.0\n\nlibbar\n"),
                ],
            );
            assert_eq!(
                read_dependencies(&pkg).unwrap(),
                ["libfoo >= 1.0", "libbar"],
                "{name}"
            );
        }
    }

    #[test]
    fn member_without_dot_slash_matches() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = write_archive(dir.path(), "p-1.tar.gz", &[(".DEP", "only\n")]);
        assert_eq!(read_dependencies(&pkg).unwrap(), ["only"]);
    }

    #[test]
    fn member_names_ignore_current_dir() {
        assert!(same_member(Path::new("./.DEP"), Path::new(".DEP")));
        assert!(same_member(Path::new(".DEP"), Path::new("./.DEP")));
        assert!(same_member(Path::new("./a/./b"), Path::new("a/b")));
        assert!(!same_member(Path::new("./sub/.DEP"), Path::new("./.DEP")));
    }

    #[test]
    fn nested_manifest_is_not_the_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = write_archive(dir.path(), "p-1.tar.gz", &[("./sub/.DEP", "nope\n")]);
        assert!(read_dependencies(&pkg).unwrap().is_empty());
    }

    #[test]
    fn missing_manifest_means_no_deps() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = write_archive(dir.path(), "p-1.tar.gz", &[("./README", "hi\n")]);
        assert!(read_dependencies(&pkg).unwrap().is_empty());
    }

    #[test]
    fn corrupt_archive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken-1.tar.gz");
        std::fs::write(&path, b"this is not gzip data at all").unwrap();
        let pkg = classify(&path).unwrap();

        assert!(matches!(
            read_dependencies(&pkg),
            Err(ExtractError::Archive { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let pkg = classify(Path::new("/nonexistent/dir/p-1.tar.gz")).unwrap();
        assert!(matches!(
            read_dependencies(&pkg),
            Err(ExtractError::Open { .. })
        ));
    }
}
