//! Duplicate file detection using content hashing.
//!
//! Three phases keep disk I/O down:
//! 1. Group files by size (instant, O(n))
//! 2. Compute a partial hash for size-matched files (first + last 4KB)
//! 3. Compute the full BLAKE3 digest for partial-hash matches
//!
//! Hardlinked paths are hashed once: a concurrent (device, inode) cache
//! hands every additional link the digest that was already computed.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use blake3::Hasher;
use dashmap::DashMap;
use derive_builder::Builder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use treedup_core::{Digest, FileMatch, InodeInfo};

/// Configuration for duplicate file detection.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct DedupeConfig {
    /// Minimum file size to consider.
    #[builder(default = "0")]
    pub min_size: u64,

    /// Maximum file size to consider.
    #[builder(default = "u64::MAX")]
    pub max_size: u64,

    /// Use the partial-hash prefilter before hashing whole files.
    #[builder(default = "true")]
    pub quick_compare: bool,

    /// Bytes hashed from the start of a file for the partial hash.
    #[builder(default = "4096")]
    pub partial_hash_head: usize,

    /// Bytes hashed from the end of a file for the partial hash.
    #[builder(default = "4096")]
    pub partial_hash_tail: usize,

    /// Treat a symlink to a regular file as a candidate.
    ///
    /// Must match the enumeration setting: when the census follows
    /// symlinks it counts the linked files, and a directory whose counted
    /// files are never hashed can never complete.
    #[builder(default = "false")]
    pub follow_symlinks: bool,
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            min_size: 0,
            max_size: u64::MAX,
            quick_compare: true,
            partial_hash_head: 4096,
            partial_hash_tail: 4096,
            follow_symlinks: false,
        }
    }
}

impl DedupeConfig {
    /// Create a new config builder.
    pub fn builder() -> DedupeConfigBuilder {
        DedupeConfigBuilder::default()
    }
}

/// A group of files sharing the same content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileGroup {
    /// Content digest shared by all files in this group.
    pub digest: Digest,

    /// Size of each file in bytes.
    pub size: u64,

    /// Paths of all files with this content, sorted.
    pub paths: Vec<PathBuf>,
}

impl FileGroup {
    /// Number of files in the group.
    pub fn count(&self) -> usize {
        self.paths.len()
    }

    /// Space reclaimable by keeping one copy.
    pub fn wasted_bytes(&self) -> u64 {
        self.size * (self.paths.len() as u64 - 1)
    }

    /// The matched-file records this group contributes to the merger.
    pub fn matches(&self) -> impl Iterator<Item = FileMatch> + '_ {
        self.paths
            .iter()
            .map(move |p| FileMatch::new(p.clone(), self.digest, self.size))
    }
}

/// Results from duplicate file detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupeReport {
    /// Duplicate groups, largest wasted space first.
    pub groups: Vec<FileGroup>,

    /// Number of files that passed the size filters.
    pub files_considered: u64,

    /// Total space reclaimable across all groups.
    pub total_wasted_bytes: u64,
}

impl DedupeReport {
    /// Whether any duplicates were found.
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Total number of files across all duplicate groups.
    pub fn total_duplicate_files(&self) -> usize {
        self.groups.iter().map(|g| g.paths.len()).sum()
    }

    /// Every matched file, ready to feed into the tree merger.
    pub fn matches(&self) -> impl Iterator<Item = FileMatch> + '_ {
        self.groups.iter().flat_map(|g| g.matches())
    }
}

/// Duplicate file finder.
pub struct Deduper {
    config: DedupeConfig,
    hardlink_cache: DashMap<InodeInfo, Digest>,
}

impl Deduper {
    /// Create a deduper with the default config.
    pub fn new() -> Self {
        Self::with_config(DedupeConfig::default())
    }

    /// Create a deduper with a custom config.
    pub fn with_config(config: DedupeConfig) -> Self {
        Self {
            config,
            hardlink_cache: DashMap::new(),
        }
    }

    /// Find groups of content-identical files among `files`.
    pub fn find_matches(&self, files: &[PathBuf]) -> DedupeReport {
        let infos: Vec<FileInfo> = files
            .iter()
            .filter_map(|path| self.file_info(path))
            .collect();
        let files_considered = infos.len() as u64;

        // Phase 1: only files of equal size can be duplicates.
        let mut size_groups: HashMap<u64, Vec<FileInfo>> = HashMap::new();
        for info in infos {
            size_groups.entry(info.size).or_default().push(info);
        }
        size_groups.retain(|_, group| group.len() > 1);

        let mut groups: Vec<FileGroup> = size_groups
            .into_par_iter()
            .flat_map(|(size, group)| self.dups_in_size_group(size, group))
            .collect();

        // Parallel collection order is arbitrary; pin the report down.
        groups.sort_by(|a, b| {
            b.wasted_bytes()
                .cmp(&a.wasted_bytes())
                .then_with(|| a.paths[0].cmp(&b.paths[0]))
        });
        let total_wasted_bytes = groups.iter().map(FileGroup::wasted_bytes).sum();

        DedupeReport {
            groups,
            files_considered,
            total_wasted_bytes,
        }
    }

    fn dups_in_size_group(&self, size: u64, group: Vec<FileInfo>) -> Vec<FileGroup> {
        if self.config.quick_compare {
            // Phase 2: weed out near-misses with a cheap partial hash.
            let partials: Vec<(FileInfo, Option<[u8; 32]>)> = group
                .into_par_iter()
                .map(|info| {
                    let partial = self.partial_hash(&info.path, info.size);
                    (info, partial)
                })
                .collect();

            let mut candidates: HashMap<[u8; 32], Vec<FileInfo>> = HashMap::new();
            for (info, partial) in partials {
                if let Some(partial) = partial {
                    candidates.entry(partial).or_default().push(info);
                }
            }

            candidates
                .into_iter()
                .filter(|(_, group)| group.len() > 1)
                .flat_map(|(_, group)| self.confirm_group(size, group))
                .collect()
        } else {
            self.confirm_group(size, group)
        }
    }

    /// Phase 3: full digests settle group membership for good.
    fn confirm_group(&self, size: u64, group: Vec<FileInfo>) -> Vec<FileGroup> {
        let digests: Vec<(PathBuf, Option<Digest>)> = group
            .into_par_iter()
            .map(|info| {
                let digest = self.digest_file(&info);
                (info.path, digest)
            })
            .collect();

        let mut by_digest: HashMap<Digest, Vec<PathBuf>> = HashMap::new();
        for (path, digest) in digests {
            if let Some(digest) = digest {
                by_digest.entry(digest).or_default().push(path);
            }
        }

        by_digest
            .into_iter()
            .filter(|(_, paths)| paths.len() > 1)
            .map(|(digest, mut paths)| {
                paths.sort();
                FileGroup {
                    digest,
                    size,
                    paths,
                }
            })
            .collect()
    }

    fn file_info(&self, path: &Path) -> Option<FileInfo> {
        let metadata = if self.config.follow_symlinks {
            std::fs::metadata(path).ok()?
        } else {
            std::fs::symlink_metadata(path).ok()?
        };
        if !metadata.is_file() {
            return None;
        }
        let size = metadata.len();
        if size < self.config.min_size || size > self.config.max_size {
            return None;
        }
        Some(FileInfo {
            path: path.to_path_buf(),
            size,
            inode: hardlink_inode(&metadata),
        })
    }

    /// Compute a partial hash (first + last N bytes + length).
    fn partial_hash(&self, path: &Path, size: u64) -> Option<[u8; 32]> {
        let mut file = File::open(path).ok()?;
        let mut hasher = Hasher::new();

        let head_size = (self.config.partial_hash_head as u64).min(size);
        let mut head = vec![0u8; head_size as usize];
        file.read_exact(&mut head).ok()?;
        hasher.update(&head);

        if size > head_size {
            let tail_size = (self.config.partial_hash_tail as u64).min(size - head_size);
            if tail_size > 0 {
                file.seek(SeekFrom::End(-(tail_size as i64))).ok()?;
                let mut tail = vec![0u8; tail_size as usize];
                file.read_exact(&mut tail).ok()?;
                hasher.update(&tail);
            }
        }

        // Length differentiates files with identical head and tail.
        hasher.update(&size.to_le_bytes());
        Some(*hasher.finalize().as_bytes())
    }

    /// Compute the full BLAKE3 digest of a file.
    fn digest_file(&self, info: &FileInfo) -> Option<Digest> {
        if let Some(inode) = info.inode {
            if let Some(cached) = self.hardlink_cache.get(&inode) {
                return Some(*cached);
            }
        }

        let file = File::open(&info.path).ok()?;
        let digest = if info.size > 128 * 1024 {
            // Memory-mapped hashing is much faster for large files.
            let mmap = unsafe { memmap2::Mmap::map(&file).ok()? };
            Digest::new(*blake3::hash(&mmap).as_bytes())
        } else {
            let mut hasher = Hasher::new();
            let mut buffer = vec![0u8; 64 * 1024];
            let mut file = file;
            loop {
                let read = file.read(&mut buffer).ok()?;
                if read == 0 {
                    break;
                }
                hasher.update(&buffer[..read]);
            }
            Digest::new(*hasher.finalize().as_bytes())
        };

        if let Some(inode) = info.inode {
            self.hardlink_cache.insert(inode, digest);
        }
        Some(digest)
    }
}

impl Default for Deduper {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal struct for file information.
#[derive(Debug, Clone)]
struct FileInfo {
    path: PathBuf,
    size: u64,
    inode: Option<InodeInfo>,
}

/// Inode identity for files with more than one link.
#[cfg(unix)]
fn hardlink_inode(metadata: &std::fs::Metadata) -> Option<InodeInfo> {
    use std::os::unix::fs::MetadataExt;
    (metadata.nlink() > 1).then(|| InodeInfo::new(metadata.ino(), metadata.dev()))
}

#[cfg(not(unix))]
fn hardlink_inode(_metadata: &std::fs::Metadata) -> Option<InodeInfo> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::write(root.join("file1.txt"), "duplicate content here").unwrap();
        fs::write(root.join("file2.txt"), "duplicate content here").unwrap();
        fs::write(root.join("file3.txt"), "unique content").unwrap();

        fs::create_dir(root.join("subdir")).unwrap();
        fs::write(root.join("subdir/file4.txt"), "duplicate content here").unwrap();

        temp
    }

    fn paths_in(temp: &TempDir) -> Vec<PathBuf> {
        vec![
            temp.path().join("file1.txt"),
            temp.path().join("file2.txt"),
            temp.path().join("file3.txt"),
            temp.path().join("subdir/file4.txt"),
        ]
    }

    #[test]
    fn test_finds_exact_duplicates() {
        let temp = fixture();
        let report = Deduper::new().find_matches(&paths_in(&temp));

        assert_eq!(report.files_considered, 4);
        assert!(report.has_duplicates());
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].count(), 3);
        assert_eq!(
            report.groups[0].wasted_bytes(),
            "duplicate content here".len() as u64 * 2
        );
    }

    #[test]
    fn test_no_duplicates_among_distinct_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), "content one").unwrap();
        fs::write(temp.path().join("b"), "content two").unwrap();

        let report = Deduper::new()
            .find_matches(&[temp.path().join("a"), temp.path().join("b")]);
        assert!(!report.has_duplicates());
    }

    #[test]
    fn test_quick_compare_agrees_with_full_hash() {
        let temp = fixture();
        let quick = Deduper::new().find_matches(&paths_in(&temp));

        let config = DedupeConfig::builder().quick_compare(false).build().unwrap();
        let thorough = Deduper::with_config(config).find_matches(&paths_in(&temp));

        assert_eq!(quick.groups.len(), thorough.groups.len());
        assert_eq!(quick.groups[0].paths, thorough.groups[0].paths);
        assert_eq!(quick.groups[0].digest, thorough.groups[0].digest);
    }

    #[test]
    fn test_size_filter() {
        let temp = fixture();
        let config = DedupeConfig::builder().min_size(1024u64).build().unwrap();
        let report = Deduper::with_config(config).find_matches(&paths_in(&temp));

        assert_eq!(report.files_considered, 0);
        assert!(!report.has_duplicates());
    }

    #[test]
    fn test_matches_cover_every_group_member() {
        let temp = fixture();
        let report = Deduper::new().find_matches(&paths_in(&temp));

        let matches: Vec<FileMatch> = report.matches().collect();
        assert_eq!(matches.len(), 3);
        assert!(matches.iter().all(|m| m.digest == report.groups[0].digest));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_follow_the_config() {
        let temp = TempDir::new().unwrap();
        let original = temp.path().join("original");
        let link = temp.path().join("link");
        fs::write(&original, "linked content").unwrap();
        std::os::unix::fs::symlink(&original, &link).unwrap();

        let ignored = Deduper::new().find_matches(&[original.clone(), link.clone()]);
        assert_eq!(ignored.files_considered, 1);
        assert!(!ignored.has_duplicates());

        let config = DedupeConfig::builder().follow_symlinks(true).build().unwrap();
        let followed = Deduper::with_config(config).find_matches(&[original, link]);
        assert_eq!(followed.files_considered, 2);
        assert_eq!(followed.groups.len(), 1);
        assert_eq!(followed.groups[0].count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_hardlinks_group_together() {
        let temp = TempDir::new().unwrap();
        let original = temp.path().join("original");
        let link = temp.path().join("link");
        fs::write(&original, "linked content").unwrap();
        fs::hard_link(&original, &link).unwrap();

        let report = Deduper::new().find_matches(&[original.clone(), link.clone()]);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].count(), 2);
    }
}
