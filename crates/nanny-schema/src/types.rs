//! Catalog records and package name parsing.

use crate::hash::FileHash;

/// One catalog record describing a package archive in the repository.
///
/// Shared between the generator (producer) and anything that reads the
/// catalog back. Entries are replaced, never edited: a regeneration pass
/// either carries the previous record over unchanged or builds a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    /// Package name (e.g. `libphonenumber`)
    pub name: String,

    /// Version string (e.g. `1.2.0`)
    pub version: String,

    /// Repository-relative path, `/`-separated. Unique within an index.
    pub file: String,

    /// Content fingerprint or the `unknown` sentinel
    pub hash: FileHash,

    /// Raw dependency declarations in manifest order
    pub deps: Vec<String>,
}

/// Errors that can occur when deriving a name and version from an archive name.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The base name has no hyphen separating name from version.
    #[error("package name '{0}' has no '-' separating name from version")]
    MissingVersion(String),
}

impl PackageEntry {
    /// Build an entry for `file`, deriving name and version from `stem`
    /// (the archive base name without its format suffix).
    ///
    /// # Errors
    ///
    /// Returns [`NameError::MissingVersion`] if `stem` contains no hyphen.
    pub fn from_stem(
        stem: &str,
        file: impl Into<String>,
        hash: FileHash,
        deps: Vec<String>,
    ) -> Result<Self, NameError> {
        let (name, version) = split_name_version(stem)?;
        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            file: file.into(),
            hash,
            deps,
        })
    }
}

/// Split an archive stem into `(name, version)`.
///
/// The split happens at the last hyphen. Anything from the first underscore
/// of the version segment on is a build suffix and is dropped:
/// `foo-bar-1.2.3_extra` becomes `("foo-bar", "1.2.3")`.
///
/// # Errors
///
/// Returns [`NameError::MissingVersion`] if `stem` contains no hyphen.
pub fn split_name_version(stem: &str) -> Result<(&str, &str), NameError> {
    let (name, version) = stem
        .rsplit_once('-')
        .ok_or_else(|| NameError::MissingVersion(stem.to_string()))?;
    let version = version.split_once('_').map_or(version, |(v, _)| v);
    Ok((name, version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_last_hyphen() {
        assert_eq!(
            split_name_version("foo-bar-1.2.3").unwrap(),
            ("foo-bar", "1.2.3")
        );
    }

    #[test]
    fn strips_underscore_suffix() {
        assert_eq!(
            split_name_version("foo-bar-1.2.3_extra").unwrap(),
            ("foo-bar", "1.2.3")
        );
        assert_eq!(
            split_name_version("tool-2.0_rc1_amd64").unwrap(),
            ("tool", "2.0")
        );
    }

    #[test]
    fn underscore_in_name_is_kept() {
        assert_eq!(
            split_name_version("my_tool-0.9").unwrap(),
            ("my_tool", "0.9")
        );
    }

    #[test]
    fn missing_hyphen_is_an_error() {
        assert_eq!(
            split_name_version("nohyphen"),
            Err(NameError::MissingVersion("nohyphen".to_string()))
        );
    }

    #[test]
    fn from_stem_fills_every_field() {
        let entry = PackageEntry::from_stem(
            "supervisor-common-0.33",
            "supervisor/supervisor-common-0.33.tar.bz2",
            FileHash::unknown(),
            vec!["tuenti-common >= 7.8".to_string()],
        )
        .unwrap();

        assert_eq!(entry.name, "supervisor-common");
        assert_eq!(entry.version, "0.33");
        assert_eq!(entry.file, "supervisor/supervisor-common-0.33.tar.bz2");
        assert!(entry.hash.is_unknown());
        assert_eq!(entry.deps, ["tuenti-common >= 7.8"]);
    }
}
