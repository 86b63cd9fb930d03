//! Duplicate detection for treedup.
//!
//! Two stages live here:
//!
//! - **File dedup** - group candidate files by content using size
//!   grouping, an optional partial hash, and a full BLAKE3 digest.
//! - **Tree merging** - fold the matched-file stream bottom-up into
//!   directory aggregates and report whole directories that duplicate
//!   each other, suppressing their descendants.
//!
//! ```rust,ignore
//! use treedup_analyze::{Deduper, TreeMerger};
//! use treedup_scan::{Census, SessionConfig};
//!
//! let config = SessionConfig::new(["/photos", "/backup/photos"]);
//! let census = Census::new().collect(&config)?;
//!
//! let matches = Deduper::new().find_matches(&census.files);
//! let mut merger = TreeMerger::with_census(census);
//! for file in matches.matches() {
//!     merger.feed(file)?;
//! }
//!
//! let report = merger.finish();
//! report.write_to(&mut std::io::stdout().lock())?;
//! ```

mod dedupe;
mod directory;
mod merger;
mod report;

pub use dedupe::{DedupeConfig, DedupeReport, Deduper, FileGroup};
pub use directory::{Directory, DirectoryId};
pub use merger::TreeMerger;
pub use report::{DirGroup, MergeReport};

// Re-export core types
pub use treedup_core::{Digest, FileMatch, MergeError, SessionConfig};
