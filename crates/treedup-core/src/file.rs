//! Matched file records fed into the tree merger.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// Inode identity for hardlink detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InodeInfo {
    /// Inode number.
    pub inode: u64,
    /// Device ID.
    pub device: u64,
}

impl InodeInfo {
    /// Create new inode info.
    pub fn new(inode: u64, device: u64) -> Self {
        Self { inode, device }
    }
}

/// A file whose content has been matched upstream.
///
/// The merger reads only the path and the digest; everything else is
/// carried through untouched for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMatch {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Content digest shared by every file in the match group.
    pub digest: Digest,
    /// Size in bytes.
    pub size: u64,
}

impl FileMatch {
    /// Create a new matched file record.
    pub fn new(path: impl Into<PathBuf>, digest: Digest, size: u64) -> Self {
        Self {
            path: path.into(),
            digest,
            size,
        }
    }
}
