//! Archive content fingerprints.

/// Placeholder fingerprint stored when a file was not hashed.
pub const UNKNOWN_HASH: &str = "unknown";

/// Content fingerprint of a package archive as stored in the catalog.
///
/// Holds either a lowercase hex digest or the [`UNKNOWN_HASH`] sentinel.
/// No validation of the digest length is done: the catalog may have been
/// produced with any algorithm (`sha256`, `blake3`, an external `md5sum`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHash(String);

impl FileHash {
    /// Create a hash from a digest string, lowercasing it.
    ///
    /// An empty string becomes the sentinel.
    pub fn new(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            return Self::unknown();
        }
        Self(s.to_ascii_lowercase())
    }

    /// The "hash not computed" sentinel.
    pub fn unknown() -> Self {
        Self(UNKNOWN_HASH.to_string())
    }

    /// Whether this is the [`UNKNOWN_HASH`] sentinel.
    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_HASH
    }

    /// Whether a stored entry with this hash may be reused for a file that
    /// now hashes to `other`.
    ///
    /// The sentinel never matches anything, itself included, so an entry
    /// recorded without a hash is always recomputed.
    pub fn matches(&self, other: &FileHash) -> bool {
        !self.is_unknown() && !other.is_unknown() && self.0 == other.0
    }

    /// Return the inner string as a slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FileHash {
    fn default() -> Self {
        Self::unknown()
    }
}

impl std::fmt::Display for FileHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for FileHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for FileHash {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for FileHash {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digests_are_lowercased() {
        assert_eq!(FileHash::new("ABCdef01").as_str(), "abcdef01");
    }

    #[test]
    fn empty_digest_is_unknown() {
        assert!(FileHash::new("").is_unknown());
        assert!(FileHash::default().is_unknown());
    }

    #[test]
    fn equal_digests_match() {
        let a = FileHash::new("d41d8cd98f00b204e9800998ecf8427e");
        let b = FileHash::new("D41D8CD98F00B204E9800998ECF8427E");
        assert!(a.matches(&b));
        assert!(!a.matches(&FileHash::new("00")));
    }

    #[test]
    fn sentinel_never_matches() {
        let unknown = FileHash::unknown();
        assert!(!unknown.matches(&FileHash::unknown()));
        assert!(!unknown.matches(&FileHash::new("abc")));
        assert!(!FileHash::new("abc").matches(&unknown));
    }
}
