//! Content hashing for discovered archives.
//!
//! Every hasher maps a batch of paths to fingerprints. A path missing from
//! the returned map could not be hashed and is recorded as `unknown`.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use nanny_schema::FileHash;
use rayon::prelude::*;

/// Paths handed to one external hashing process, to stay well below
/// argument-length limits.
const COMMAND_BATCH: usize = 512;

/// Computes fingerprints for a batch of files.
pub trait ContentHasher: Send + Sync {
    /// Hash every path it can.
    ///
    /// Failures are logged and leave the path out of the result; they never
    /// abort the batch.
    fn hash_files(&self, paths: &[PathBuf]) -> HashMap<PathBuf, FileHash>;
}

/// In-process digest algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-256 (default)
    #[default]
    Sha256,
    /// BLAKE3, much faster on large repositories
    Blake3,
}

impl HashAlgorithm {
    /// Algorithm name as accepted on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }

    /// Compute the hash of a file (streaming).
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened or read.
    pub fn hash_file(self, path: &Path) -> io::Result<FileHash> {
        let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);

        let digest = match self {
            Self::Sha256 => {
                use sha2::{Digest, Sha256};
                let mut hasher = Sha256::new();
                io::copy(&mut reader, &mut hasher)?;
                hex::encode(hasher.finalize())
            }
            Self::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                io::copy(&mut reader, &mut hasher)?;
                hasher.finalize().to_hex().to_string()
            }
        };

        Ok(FileHash::new(digest))
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "blake3" | "b3" => Ok(Self::Blake3),
            _ => Err(format!("Unknown hash algorithm: {s}")),
        }
    }
}

/// Hashes files in-process, in parallel.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestHasher {
    algorithm: HashAlgorithm,
}

impl DigestHasher {
    /// Create a hasher for `algorithm`.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }
}

impl ContentHasher for DigestHasher {
    fn hash_files(&self, paths: &[PathBuf]) -> HashMap<PathBuf, FileHash> {
        paths
            .par_iter()
            .filter_map(|path| match self.algorithm.hash_file(path) {
                Ok(hash) => Some((path.clone(), hash)),
                Err(e) => {
                    tracing::warn!("cannot hash {}: {e}", path.display());
                    None
                }
            })
            .collect()
    }
}

/// Hashes files by running an external `*sum`-style tool.
///
/// The tool is invoked as `<program> <paths...>` and must print lines of the
/// form `<hex digest> <path>` (coreutils style, an optional `*` binary-mode
/// marker before the path is accepted).
#[derive(Debug, Clone)]
pub struct CommandHasher {
    program: String,
}

impl CommandHasher {
    /// Create a hasher running `program` (e.g. `sha256sum`, `md5sum`).
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run_batch(&self, program: &Path, paths: &[PathBuf]) -> HashMap<PathBuf, FileHash> {
        let output = match Command::new(program).args(paths).output() {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("failed to run {}: {e}", self.program);
                return HashMap::new();
            }
        };

        // Non-zero exit only means some files failed; the rest are still listed.
        if !output.status.success() {
            tracing::warn!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        parse_digest_lines(&String::from_utf8_lossy(&output.stdout))
    }
}

impl ContentHasher for CommandHasher {
    fn hash_files(&self, paths: &[PathBuf]) -> HashMap<PathBuf, FileHash> {
        if paths.is_empty() {
            return HashMap::new();
        }

        let program = match which::which(&self.program) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("hash command '{}' not found: {e}", self.program);
                return HashMap::new();
            }
        };

        paths
            .chunks(COMMAND_BATCH)
            .flat_map(|chunk| self.run_batch(&program, chunk))
            .collect()
    }
}

/// Parse `<digest> [*]<path>` lines as printed by coreutils `*sum` tools.
///
/// Lines starting with `\` (escaped file names) and lines whose first field
/// is not hex are skipped.
pub fn parse_digest_lines(stdout: &str) -> HashMap<PathBuf, FileHash> {
    stdout
        .lines()
        .filter(|line| !line.starts_with('\\'))
        .filter_map(|line| {
            let (digest, rest) = line.split_once(char::is_whitespace)?;
            if digest.is_empty() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return None;
            }
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            let path = rest.strip_prefix('*').unwrap_or(rest);
            if path.is_empty() {
                return None;
            }
            Some((PathBuf::from(path), FileHash::new(digest)))
        })
        .collect()
}

/// Records every file as `unknown`, skipping all I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeHasher;

impl ContentHasher for FakeHasher {
    fn hash_files(&self, paths: &[PathBuf]) -> HashMap<PathBuf, FileHash> {
        paths
            .iter()
            .map(|p| (p.clone(), FileHash::unknown()))
            .collect()
    }
}

/// How archive fingerprints are obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashMode {
    /// Hash in-process with the given algorithm.
    Digest(HashAlgorithm),
    /// Run an external tool such as `md5sum`.
    Command(String),
    /// Do not hash; every archive gets the `unknown` sentinel.
    Fake,
}

impl Default for HashMode {
    fn default() -> Self {
        Self::Digest(HashAlgorithm::default())
    }
}

impl HashMode {
    /// Build the hasher for this mode.
    pub fn hasher(&self) -> Box<dyn ContentHasher> {
        match self {
            Self::Digest(algorithm) => Box::new(DigestHasher::new(*algorithm)),
            Self::Command(program) => Box::new(CommandHasher::new(program.clone())),
            Self::Fake => Box::new(FakeHasher),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known digests of "hello world".
    const SHA256_HELLO: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn sha256_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a-1.tar.gz");
        std::fs::write(&path, b"hello world").unwrap();

        let hash = HashAlgorithm::Sha256.hash_file(&path).unwrap();
        assert_eq!(hash.as_str(), SHA256_HELLO);
    }

    #[test]
    fn blake3_matches_one_shot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a-1.tar.gz");
        // Larger than the read buffer so streaming is exercised.
        let data = vec![7u8; 200 * 1024];
        std::fs::write(&path, &data).unwrap();

        let hash = HashAlgorithm::Blake3.hash_file(&path).unwrap();
        assert_eq!(hash.as_str(), blake3::hash(&data).to_hex().as_str());
    }

    #[test]
    fn unreadable_file_is_left_out() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good-1.tar");
        let missing = dir.path().join("missing-1.tar");
        std::fs::write(&good, b"hello world").unwrap();

        let hashes = DigestHasher::default().hash_files(&[good.clone(), missing.clone()]);
        assert_eq!(hashes.len(), 1);
        assert_eq!(hashes[&good].as_str(), SHA256_HELLO);
        assert!(!hashes.contains_key(&missing));
    }

    #[test]
    fn fake_hasher_uses_sentinel() {
        let paths = vec![PathBuf::from("/nope/a-1.tar"), PathBuf::from("/nope/b-2.tar")];
        let hashes = FakeHasher.hash_files(&paths);
        assert_eq!(hashes.len(), 2);
        assert!(hashes.values().all(FileHash::is_unknown));
    }

    #[test]
    fn parses_coreutils_output() {
        let out = "d41d8cd98f00b204e9800998ecf8427e  /repo/a-1.tar.gz\n\
                   5D41402ABC4B2A76B9719D911017C592 */repo/with space-2.tar\n\
                   \\0123  /repo/escaped\\nname-3.tar\n\
                   md5sum: /repo/gone-4.tar: No such file or directory\n";
        let hashes = parse_digest_lines(out);

        assert_eq!(hashes.len(), 2);
        assert_eq!(
            hashes[Path::new("/repo/a-1.tar.gz")].as_str(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            hashes[Path::new("/repo/with space-2.tar")].as_str(),
            "5d41402abc4b2a76b9719d911017c592"
        );
    }

    #[test]
    fn missing_command_hashes_nothing() {
        let hashes = CommandHasher::new("definitely-not-a-real-hash-tool")
            .hash_files(&[PathBuf::from("/tmp/a-1.tar")]);
        assert!(hashes.is_empty());
    }

    #[test]
    fn command_hasher_agrees_with_digest() {
        if which::which("sha256sum").is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a-1.tar.gz");
        std::fs::write(&path, b"hello world").unwrap();

        let hashes = CommandHasher::new("sha256sum").hash_files(std::slice::from_ref(&path));
        assert_eq!(hashes[&path].as_str(), SHA256_HELLO);
    }

    #[test]
    fn algorithm_from_str() {
        assert_eq!("SHA256".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Sha256));
        assert_eq!("blake3".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Blake3));
        assert!("md5".parse::<HashAlgorithm>().is_err());
    }
}
