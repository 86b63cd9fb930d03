//! Duplicate directory report.

use std::io::{self, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A set of directories with identical contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirGroup {
    /// Shared rolling fingerprint of the group.
    pub fingerprint: u64,

    /// The duplicate directories, shallowest first.
    pub dirs: Vec<PathBuf>,
}

impl DirGroup {
    /// Number of directories in the group.
    pub fn count(&self) -> usize {
        self.dirs.len()
    }
}

/// Results of a tree merge: duplicate directory groups, ancestor groups
/// first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeReport {
    /// The reported groups.
    pub groups: Vec<DirGroup>,
}

impl MergeReport {
    /// Whether any duplicate directories were found.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of groups reported.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Total number of directories across all groups.
    pub fn total_directories(&self) -> usize {
        self.groups.iter().map(DirGroup::count).sum()
    }

    /// Write the line-oriented report: one `<fingerprint> <path>` line
    /// per directory, each group terminated by `--`.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for group in &self.groups {
            for dir in &group.dirs {
                writeln!(out, "{:016x} {}", group.fingerprint, dir.display())?;
            }
            writeln!(out, "--")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_format() {
        let report = MergeReport {
            groups: vec![DirGroup {
                fingerprint: 0xdead_beef,
                dirs: vec![PathBuf::from("/a"), PathBuf::from("/b")],
            }],
        };

        let mut out = Vec::new();
        report.write_to(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "00000000deadbeef /a\n00000000deadbeef /b\n--\n"
        );
    }

    #[test]
    fn test_empty_report_writes_nothing() {
        let report = MergeReport::default();
        let mut out = Vec::new();
        report.write_to(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_counts() {
        let report = MergeReport {
            groups: vec![
                DirGroup {
                    fingerprint: 1,
                    dirs: vec![PathBuf::from("/a"), PathBuf::from("/b")],
                },
                DirGroup {
                    fingerprint: 2,
                    dirs: vec![PathBuf::from("/c"), PathBuf::from("/d"), PathBuf::from("/e")],
                },
            ],
        };
        assert_eq!(report.group_count(), 2);
        assert_eq!(report.total_directories(), 5);
    }

    #[test]
    fn test_report_round_trips_through_json() {
        let report = MergeReport {
            groups: vec![DirGroup {
                fingerprint: 42,
                dirs: vec![PathBuf::from("/a")],
            }],
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: MergeReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.groups[0].fingerprint, 42);
        assert_eq!(back.groups[0].dirs, vec![PathBuf::from("/a")]);
    }
}
