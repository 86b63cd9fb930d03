//! Bottom-up directory merger.
//!
//! Matched files stream in one at a time and accumulate in their owning
//! directory. Once feeding ends, complete directories are promoted into
//! their parents round by round until nothing more can rise, and
//! directories with identical contents are reported as duplicate groups,
//! shallowest first.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use treedup_core::{parent_dir, path_key, FileMatch, MergeError, PathTrie, ScanWarning, SessionConfig};
use treedup_scan::{Census, FileCensus};

use crate::directory::{Directory, DirectoryId};
use crate::report::{DirGroup, MergeReport};

/// Directories that share a fingerprint *and* identical digest
/// multisets. Fingerprint collisions coexist in one bucket but land in
/// separate classes.
#[derive(Debug)]
struct EquivClass {
    members: Vec<DirectoryId>,
}

/// The tree-merger engine.
///
/// Single-threaded by design: [`feed`](Self::feed) calls are serialized
/// by the caller and [`finish`](Self::finish) runs to completion
/// synchronously. Dropping the merger releases the directory arena and
/// every index into it.
pub struct TreeMerger {
    /// Arena owning every directory record.
    dirs: Vec<Directory>,
    /// Directory path -> arena index.
    dir_trie: PathTrie<DirectoryId>,
    /// Directory path -> candidate file count from the census.
    counts: PathTrie<u64>,
    /// Directories created during feeding; the promotion worklist seed.
    valid_dirs: Vec<DirectoryId>,
    /// Fingerprint -> equivalence classes of content-equal directories.
    buckets: HashMap<u64, Vec<EquivClass>>,
    warnings: Vec<ScanWarning>,
}

impl TreeMerger {
    /// Create a merger for the configured roots, running the counting
    /// pass immediately.
    pub fn new(config: &SessionConfig) -> Result<Self, MergeError> {
        let census = Census::new().collect(config)?;
        Ok(Self::with_census(census))
    }

    /// Create a merger from an already-collected census.
    pub fn with_census(census: FileCensus) -> Self {
        Self {
            dirs: Vec::new(),
            dir_trie: PathTrie::new(),
            counts: census.counts,
            valid_dirs: Vec::new(),
            buckets: HashMap::new(),
            warnings: census.warnings,
        }
    }

    /// Warnings carried over from the counting pass.
    pub fn warnings(&self) -> &[ScanWarning] {
        &self.warnings
    }

    /// Number of directories known so far.
    pub fn directory_count(&self) -> usize {
        self.dirs.len()
    }

    /// The live record for `path`, if any file has resolved into it.
    pub fn directory_for(&self, path: &std::path::Path) -> Option<&Directory> {
        let id = *self.dir_trie.get(&path_key(path))?;
        Some(&self.dirs[id.0])
    }

    /// Fold one matched file into its owning directory.
    ///
    /// Each file must be fed at most once; feeding a file twice corrupts
    /// the fingerprint. Relative paths are refused.
    pub fn feed(&mut self, file: FileMatch) -> Result<(), MergeError> {
        if !file.path.is_absolute() {
            return Err(MergeError::InvalidPath { path: file.path });
        }
        let Some(dir_path) = parent_dir(&file.path) else {
            return Err(MergeError::InvalidPath { path: file.path });
        };

        let key = path_key(dir_path);
        let id = match self.dir_trie.get(&key) {
            Some(&id) => id,
            None => {
                let expected = self.counts.get(&key).copied().unwrap_or(0);
                let id = self.alloc(dir_path.to_path_buf(), expected);
                self.dir_trie.insert(&key, id);
                self.valid_dirs.push(id);
                id
            }
        };

        self.dirs[id.0].add(Arc::new(file));
        if self.dirs[id.0].is_full() {
            self.group(id);
        }
        Ok(())
    }

    /// Merge full directories upward until nothing rises, then extract
    /// the duplicate groups.
    pub fn finish(&mut self) -> MergeReport {
        self.merge_up();
        self.extract()
    }

    fn alloc(&mut self, path: PathBuf, expected: u64) -> DirectoryId {
        let id = DirectoryId(self.dirs.len());
        self.dirs.push(Directory::new(path, expected));
        id
    }

    /// File a full directory into the grouping table, extending an
    /// existing class when the contents match exactly.
    fn group(&mut self, id: DirectoryId) {
        let dirs = &self.dirs;
        let fp = dirs[id.0].fingerprint();
        let classes = self.buckets.entry(fp).or_default();
        for class in classes.iter_mut() {
            if dirs[class.members[0].0].same_contents(&dirs[id.0]) {
                class.members.push(id);
                return;
            }
        }
        classes.push(EquivClass { members: vec![id] });
    }

    /// Promote full directories one level per round.
    ///
    /// Every full directory folds its matched files into its parent
    /// exactly once; the parents touched in a round form the next
    /// round's worklist if they filled up. A directory that is not full
    /// is dropped: its missing files are missing from every ancestor
    /// too, so no higher level can complete through it.
    fn merge_up(&mut self) {
        let mut worklist = std::mem::take(&mut self.valid_dirs);
        while !worklist.is_empty() {
            let mut touched: Vec<DirectoryId> = Vec::new();

            for id in worklist {
                if !self.dirs[id.0].is_full() || self.dirs[id.0].is_promoted() {
                    continue;
                }
                let Some(parent_path) = parent_dir(self.dirs[id.0].path()).map(PathBuf::from)
                else {
                    // The root has no parent; promotion ends here.
                    continue;
                };

                let key = path_key(&parent_path);
                let parent_id = match self.dir_trie.get(&key) {
                    Some(&pid) => pid,
                    None => {
                        let expected = self.counts.get(&key).copied().unwrap_or(0);
                        let pid = self.alloc(parent_path, expected);
                        self.dir_trie.insert(&key, pid);
                        pid
                    }
                };

                self.dirs[id.0].set_promoted();
                let files: Vec<Arc<FileMatch>> = self.dirs[id.0].matched().to_vec();
                let parent = &mut self.dirs[parent_id.0];
                for file in files {
                    parent.add(file);
                }
                parent.link_child(id);

                if !touched.contains(&parent_id) {
                    touched.push(parent_id);
                }
            }

            worklist = Vec::new();
            for pid in touched {
                if self.dirs[pid.0].is_full() {
                    self.group(pid);
                    worklist.push(pid);
                }
            }
        }
    }

    /// Walk the grouping table shallowest group first, emit every
    /// not-yet-covered member, and mark its merged subtree finished so
    /// descendants never reappear in later groups.
    fn extract(&mut self) -> MergeReport {
        let mut groups: Vec<(u64, Vec<DirectoryId>)> = Vec::new();
        for (&fp, classes) in &self.buckets {
            for class in classes {
                if class.members.len() < 2 {
                    continue;
                }
                let mut members = class.members.clone();
                members.sort_by(|a, b| {
                    self.dirs[a.0]
                        .depth()
                        .cmp(&self.dirs[b.0].depth())
                        .then_with(|| self.dirs[a.0].path().cmp(self.dirs[b.0].path()))
                });

                // A class confined to one ancestor chain is not a
                // duplicate set: a pass-through parent has the same
                // contents as its only populated child, yet there is
                // only one copy of the data.
                let head = self.dirs[members[0].0].path();
                if members[1..]
                    .iter()
                    .all(|id| self.dirs[id.0].path().starts_with(head))
                {
                    continue;
                }
                groups.push((fp, members));
            }
        }

        // Ancestor groups first; path tie-break keeps reports stable
        // from run to run.
        groups.sort_by(|(_, a), (_, b)| {
            let da = self.dirs[a[0].0].depth();
            let db = self.dirs[b[0].0].depth();
            da.cmp(&db)
                .then_with(|| self.dirs[a[0].0].path().cmp(self.dirs[b[0].0].path()))
        });

        let mut out = Vec::new();
        for (fp, members) in groups {
            let mut reported = Vec::new();
            for id in members {
                if self.dirs[id.0].is_finished() {
                    continue;
                }
                self.mark_finished(id);
                reported.push(self.dirs[id.0].path().to_path_buf());
            }
            if !reported.is_empty() {
                out.push(DirGroup {
                    fingerprint: fp,
                    dirs: reported,
                });
            }
        }

        MergeReport { groups: out }
    }

    fn mark_finished(&mut self, id: DirectoryId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.dirs[current.0].is_finished() {
                continue;
            }
            self.dirs[current.0].set_finished();
            stack.extend_from_slice(self.dirs[current.0].children());
        }
    }
}
