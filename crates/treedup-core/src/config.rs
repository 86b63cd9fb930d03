//! Session configuration.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for a dedup session: which roots to consider and how to
/// enumerate the files beneath them.
///
/// The counting pass and the hashing pipeline must agree on what counts
/// as a candidate file, so both read the same config.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct SessionConfig {
    /// Root paths to scan.
    pub paths: Vec<PathBuf>,

    /// Follow symbolic links during enumeration.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Include hidden files (starting with `.`).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// File names to skip entirely.
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Minimum file size in bytes for a file to be a candidate.
    #[builder(default = "0")]
    #[serde(default)]
    pub min_file_size: u64,

    /// Number of threads for enumeration (0 = auto-detect).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,
}

fn default_true() -> bool {
    true
}

impl SessionConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match &self.paths {
            Some(paths) if !paths.is_empty() => Ok(()),
            _ => Err("At least one root path is required".to_string()),
        }
    }
}

impl SessionConfig {
    /// Create a new config builder.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Create a simple config for a set of roots.
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            follow_symlinks: false,
            include_hidden: true,
            ignore_patterns: Vec::new(),
            min_file_size: 0,
            threads: 0,
        }
    }

    /// Check whether a file name matches an ignore pattern.
    pub fn should_ignore(&self, name: &str) -> bool {
        for pattern in &self.ignore_patterns {
            if name == pattern {
                return true;
            }
            if let Some(prefix) = pattern.strip_suffix('*') {
                if name.starts_with(prefix) {
                    return true;
                }
            }
            if let Some(suffix) = pattern.strip_prefix('*') {
                if name.ends_with(suffix) {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = SessionConfig::builder()
            .paths(vec![PathBuf::from("/data")])
            .follow_symlinks(true)
            .min_file_size(1024u64)
            .build()
            .unwrap();

        assert_eq!(config.paths, vec![PathBuf::from("/data")]);
        assert!(config.follow_symlinks);
        assert_eq!(config.min_file_size, 1024);
        assert_eq!(config.threads, 0);
    }

    #[test]
    fn test_builder_rejects_empty_roots() {
        let result = SessionConfig::builder().paths(Vec::<PathBuf>::new()).build();
        assert!(result.is_err());

        let result = SessionConfig::builder().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_should_ignore() {
        let config = SessionConfig::builder()
            .paths(vec![PathBuf::from("/data")])
            .ignore_patterns(vec!["node_modules".to_string(), "*.log".to_string()])
            .build()
            .unwrap();

        assert!(config.should_ignore("node_modules"));
        assert!(config.should_ignore("build.log"));
        assert!(!config.should_ignore("src"));
    }
}
