//! Shared types and the catalog wire format for nanny package repositories.

pub mod hash;
pub mod index;
pub mod types;

// Re-exports
pub use hash::*;
pub use index::{Index, IndexError};
pub use types::*;

/// Path of the dependency manifest inside every package archive.
pub const MANIFEST_MEMBER: &str = "./.DEP";
