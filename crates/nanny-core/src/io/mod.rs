//! IO modules - side effects (filesystem, archive streams)

pub mod archive;
pub mod extract;

pub use archive::{ArchiveFormat, PackageRef, classify};
pub use extract::{ExtractError, read_dependencies};
