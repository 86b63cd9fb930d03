//! File enumeration and counting for treedup.
//!
//! This crate runs the one-time census over the configured roots: it
//! enumerates every candidate regular file in parallel with jwalk, then
//! derives the per-ancestor file counts the tree merger needs to decide
//! when a directory is complete.

mod census;
mod progress;

pub use census::{Census, FileCensus};
pub use progress::CensusProgress;

// Re-export core types for convenience
pub use treedup_core::{PathTrie, ScanError, ScanWarning, SessionConfig, WarningKind};
