//! Core library for nanny: turns a directory of package archives into a
//! dependency-aware catalog, reusing the previous catalog where it can.

pub mod config;
pub mod indexer;
pub mod io;

pub use config::IndexConfig;
pub use indexer::{GenerateError, GenerateOutcome, IndexStatus, generate, generate_to};
pub use nanny_schema::{FileHash, Index, PackageEntry};
