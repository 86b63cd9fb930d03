//! Path ↔ byte-key conversions used by the trie-backed maps.

use std::path::{Path, PathBuf};

/// Path separator the counting pass and depth ordering operate on.
pub const SEPARATOR: u8 = b'/';

/// Encode a path as a trie key.
#[cfg(unix)]
pub fn path_key(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

/// Encode a path as a trie key.
#[cfg(not(unix))]
pub fn path_key(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

/// Decode a trie key back into a path.
#[cfg(unix)]
pub fn path_from_key(key: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(key))
}

/// Decode a trie key back into a path.
#[cfg(not(unix))]
pub fn path_from_key(key: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(key).into_owned())
}

/// The parent directory of `path`, or `None` at the root.
///
/// The returned path never carries a trailing slash; the parent of `/a`
/// is `/`. A path without a parent (the root itself, or a bare relative
/// component) yields `None`, which terminates upward promotion.
pub fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

/// Depth of a path, measured as the number of separator occurrences.
///
/// Shallower paths sort first when duplicate groups are reported, so an
/// ancestor is always emitted before any of its descendants.
pub fn path_depth(path: &Path) -> usize {
    path_key(path)
        .iter()
        .filter(|&&b| b == SEPARATOR)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_dir_chain() {
        assert_eq!(parent_dir(Path::new("/a/b/c")), Some(Path::new("/a/b")));
        assert_eq!(parent_dir(Path::new("/a")), Some(Path::new("/")));
        assert_eq!(parent_dir(Path::new("/")), None);
        assert_eq!(parent_dir(Path::new("a")), None);
    }

    #[test]
    fn test_path_depth() {
        assert_eq!(path_depth(Path::new("/")), 1);
        assert_eq!(path_depth(Path::new("/a")), 1);
        assert_eq!(path_depth(Path::new("/a/b")), 2);
        assert!(path_depth(Path::new("/a/b")) < path_depth(Path::new("/a/b/c")));
    }

    #[test]
    fn test_key_round_trip() {
        let path = Path::new("/var/tmp/file.bin");
        assert_eq!(path_from_key(&path_key(path)), PathBuf::from(path));
    }
}
