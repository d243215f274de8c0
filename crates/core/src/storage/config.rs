//! Configuration for the storage module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the filesystem object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for stored objects.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Base URL under which stored objects are served.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Buffer size for copy operations.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Prefer atomic moves (rename) when source and destination are on
    /// the same filesystem.
    #[serde(default = "default_prefer_atomic_moves")]
    pub prefer_atomic_moves: bool,

    /// Compute SHA-256 checksums for stored objects.
    #[serde(default)]
    pub compute_checksums: bool,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("./media")
}

fn default_base_url() -> String {
    "/media".to_string()
}

fn default_buffer_size() -> usize {
    64 * 1024
}

fn default_prefer_atomic_moves() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            base_url: default_base_url(),
            buffer_size: default_buffer_size(),
            prefer_atomic_moves: default_prefer_atomic_moves(),
            compute_checksums: false,
        }
    }
}

impl StorageConfig {
    /// Creates a config rooted at the given directory.
    pub fn with_root(root_dir: PathBuf) -> Self {
        Self {
            root_dir,
            ..Default::default()
        }
    }

    /// Disables atomic moves, forcing buffered copies.
    pub fn with_atomic_moves(mut self, prefer: bool) -> Self {
        self.prefer_atomic_moves = prefer;
        self
    }

    /// Enables checksum computation.
    pub fn with_checksums(mut self, compute: bool) -> Self {
        self.compute_checksums = compute;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.root_dir, PathBuf::from("./media"));
        assert_eq!(config.base_url, "/media");
        assert!(config.prefer_atomic_moves);
        assert!(!config.compute_checksums);
    }

    #[test]
    fn test_builder() {
        let config = StorageConfig::with_root(PathBuf::from("/srv/videos"))
            .with_atomic_moves(false)
            .with_checksums(true);
        assert_eq!(config.root_dir, PathBuf::from("/srv/videos"));
        assert!(!config.prefer_atomic_moves);
        assert!(config.compute_checksums);
    }
}
