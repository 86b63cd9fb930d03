//! The file-count pass.
//!
//! Directory completeness is decided against the *true* number of
//! candidate files beneath each directory, so before any merging happens
//! we enumerate every candidate file once and propagate counts to every
//! ancestor prefix, up to and including `/`.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use jwalk::{Parallelism, WalkDir};
use tokio::sync::broadcast;

use treedup_core::{
    path_from_key, path_key, PathTrie, ScanError, ScanWarning, SessionConfig, SEPARATOR,
};

use crate::progress::CensusProgress;

/// Result of the counting pass.
#[derive(Debug)]
pub struct FileCensus {
    /// Per-ancestor candidate file counts, keyed by directory path bytes.
    /// Every directory with at least one candidate file beneath it
    /// (directly or transitively) has an entry.
    pub counts: PathTrie<u64>,
    /// Every candidate file found, in lexicographic path order.
    pub files: Vec<PathBuf>,
    /// Non-fatal problems encountered while enumerating.
    pub warnings: Vec<ScanWarning>,
    /// Roots that could not be opened at all. Counts under these roots
    /// are missing, so directories there will never complete; the caller
    /// decides whether a partial census is still worth merging.
    pub failed_roots: Vec<PathBuf>,
}

impl FileCensus {
    /// Candidate file count recorded for `dir`, zero when absent.
    pub fn count_for(&self, dir: &Path) -> u64 {
        self.counts.get(&path_key(dir)).copied().unwrap_or(0)
    }

    /// Whether every configured root was enumerated.
    pub fn is_complete(&self) -> bool {
        self.failed_roots.is_empty()
    }
}

/// Runs the census over the configured roots.
pub struct Census {
    progress_tx: broadcast::Sender<CensusProgress>,
}

impl Census {
    /// Create a new census runner.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self { progress_tx }
    }

    /// Subscribe to progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<CensusProgress> {
        self.progress_tx.subscribe()
    }

    /// Enumerate all candidate files under the configured roots and build
    /// the ancestor count map.
    ///
    /// Unreadable entries are skipped and recorded as warnings. An
    /// unreadable *root* is recorded in [`FileCensus::failed_roots`] and
    /// enumeration continues with the remaining roots: the partial census
    /// is returned either way, and the caller decides whether to proceed
    /// with it. Counts derived from a partial enumeration are usable but
    /// leave affected directories forever incomplete.
    pub fn collect(&self, config: &SessionConfig) -> Result<FileCensus, ScanError> {
        if config.paths.is_empty() {
            return Err(ScanError::InvalidConfig {
                message: "no root paths to scan".to_string(),
            });
        }

        // Distinct paths only: a file reached through two overlapping
        // roots must count once.
        let mut file_trie: PathTrie<()> = PathTrie::new();
        let mut warnings = Vec::new();
        let mut failed_roots = Vec::new();
        let mut files_seen: u64 = 0;
        let mut dirs_seen: u64 = 0;

        for root in &config.paths {
            let root = match root.canonicalize() {
                Ok(root) => root,
                Err(err) => {
                    warnings.push(ScanWarning::read_error(root, &err));
                    failed_roots.push(root.clone());
                    continue;
                }
            };
            let metadata = match std::fs::symlink_metadata(&root) {
                Ok(metadata) => metadata,
                Err(err) => {
                    warnings.push(ScanWarning::metadata_error(&root, &err));
                    failed_roots.push(root);
                    continue;
                }
            };

            if metadata.is_file() {
                if metadata.len() >= config.min_file_size {
                    file_trie.insert(&path_key(&root), ());
                }
                continue;
            }

            let parallelism = match config.threads {
                0 => Parallelism::RayonDefaultPool {
                    busy_timeout: Duration::from_millis(100),
                },
                n => Parallelism::RayonNewPool(n),
            };

            let walker = WalkDir::new(&root)
                .parallelism(parallelism)
                .skip_hidden(!config.include_hidden)
                .follow_links(config.follow_symlinks);

            for entry_result in walker {
                let entry = match entry_result {
                    Ok(e) => e,
                    Err(err) => {
                        let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
                        warnings.push(ScanWarning::new(
                            path,
                            err.to_string(),
                            treedup_core::WarningKind::ReadError,
                        ));
                        continue;
                    }
                };

                if entry.file_type().is_dir() {
                    dirs_seen += 1;
                    continue;
                }
                if !entry.file_type().is_file() {
                    continue;
                }

                let name = entry.file_name().to_string_lossy().to_string();
                if config.should_ignore(&name) {
                    continue;
                }

                let path = entry.path();
                match entry.metadata() {
                    Ok(metadata) => {
                        if metadata.len() < config.min_file_size {
                            continue;
                        }
                    }
                    Err(err) => {
                        warnings.push(ScanWarning::new(
                            &path,
                            err.to_string(),
                            treedup_core::WarningKind::MetadataError,
                        ));
                        continue;
                    }
                }

                file_trie.insert(&path_key(&path), ());
                files_seen += 1;
                if files_seen % 1024 == 0 {
                    let _ = self.progress_tx.send(CensusProgress {
                        files_seen,
                        dirs_seen,
                        current_path: path,
                        errors_count: warnings.len() as u64,
                    });
                }
            }
        }

        let (counts, files) = fold_counts(&file_trie);
        Ok(FileCensus {
            counts,
            files,
            warnings,
            failed_roots,
        })
    }
}

impl Default for Census {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive per-ancestor counts from the enumerated file paths.
///
/// For each file path, every separator position yields one ancestor
/// prefix (the empty prefix stands for `/`), and each ancestor is bumped
/// by one. The trailing component is a file name, never a directory.
fn fold_counts(file_trie: &PathTrie<()>) -> (PathTrie<u64>, Vec<PathBuf>) {
    let mut counts: PathTrie<u64> = PathTrie::new();
    let mut files = Vec::with_capacity(file_trie.len());

    let _ = file_trie.visit(&mut |key, _| {
        files.push(path_from_key(key));
        for i in (0..key.len()).rev() {
            if key[i] != SEPARATOR {
                continue;
            }
            let prefix: &[u8] = if i == 0 { b"/" } else { &key[..i] };
            match counts.get_mut(prefix) {
                Some(count) => *count += 1,
                None => {
                    counts.insert(prefix, 1);
                }
            }
        }
        ControlFlow::Continue(())
    });

    (counts, files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("a")).unwrap();
        fs::create_dir(root.join("a/sub")).unwrap();
        fs::create_dir(root.join("b")).unwrap();
        fs::create_dir(root.join("empty")).unwrap();

        fs::write(root.join("a/x.bin"), "one").unwrap();
        fs::write(root.join("a/sub/y.bin"), "two").unwrap();
        fs::write(root.join("b/z.bin"), "three").unwrap();

        temp
    }

    #[test]
    fn test_counts_cover_every_ancestor() {
        let temp = fixture();
        let root = temp.path().canonicalize().unwrap();

        let census = Census::new()
            .collect(&SessionConfig::new([&root]))
            .unwrap();

        assert_eq!(census.files.len(), 3);
        assert_eq!(census.count_for(&root), 3);
        assert_eq!(census.count_for(&root.join("a")), 2);
        assert_eq!(census.count_for(&root.join("a/sub")), 1);
        assert_eq!(census.count_for(&root.join("b")), 1);
        // Directories without candidate files get no entry.
        assert_eq!(census.count_for(&root.join("empty")), 0);
        // Counts propagate all the way to the filesystem root.
        assert!(census.count_for(Path::new("/")) >= 3);
    }

    #[test]
    fn test_overlapping_roots_count_once() {
        let temp = fixture();
        let root = temp.path().canonicalize().unwrap();

        let census = Census::new()
            .collect(&SessionConfig::new([root.clone(), root.join("a")]))
            .unwrap();

        assert_eq!(census.files.len(), 3);
        assert_eq!(census.count_for(&root.join("a")), 2);
    }

    #[test]
    fn test_min_file_size_filters_candidates() {
        let temp = fixture();
        let root = temp.path().canonicalize().unwrap();

        let config = SessionConfig::builder()
            .paths(vec![root.clone()])
            .min_file_size(4u64)
            .build()
            .unwrap();
        let census = Census::new().collect(&config).unwrap();

        // Only "three" (5 bytes) survives the size floor.
        assert_eq!(census.files.len(), 1);
        assert_eq!(census.count_for(&root.join("b")), 1);
        assert_eq!(census.count_for(&root.join("a")), 0);
    }

    #[test]
    fn test_file_root_is_counted() {
        let temp = fixture();
        let root = temp.path().canonicalize().unwrap();

        let census = Census::new()
            .collect(&SessionConfig::new([root.join("a/x.bin")]))
            .unwrap();

        assert_eq!(census.files, vec![root.join("a/x.bin")]);
        assert_eq!(census.count_for(&root.join("a")), 1);
    }

    #[test]
    fn test_missing_root_is_reported_not_fatal() {
        let census = Census::new()
            .collect(&SessionConfig::new(["/no/such/treedup/root"]))
            .unwrap();

        assert!(!census.is_complete());
        assert_eq!(
            census.failed_roots,
            vec![std::path::PathBuf::from("/no/such/treedup/root")]
        );
        assert_eq!(census.warnings.len(), 1);
        assert!(census.files.is_empty());
    }

    #[test]
    fn test_failed_root_keeps_partial_census() {
        let temp = fixture();
        let root = temp.path().canonicalize().unwrap();

        let census = Census::new()
            .collect(&SessionConfig::new([
                root.clone(),
                std::path::PathBuf::from("/no/such/treedup/root"),
            ]))
            .unwrap();

        // The good root is fully counted despite the bad one.
        assert!(!census.is_complete());
        assert_eq!(census.failed_roots.len(), 1);
        assert_eq!(census.files.len(), 3);
        assert_eq!(census.count_for(&root), 3);
    }

    #[test]
    fn test_empty_roots_is_an_error() {
        let result = Census::new().collect(&SessionConfig {
            paths: Vec::new(),
            ..SessionConfig::new(["unused"])
        });
        assert!(matches!(result, Err(ScanError::InvalidConfig { .. })));
    }
}
