//! Error types for the storage module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while storing or retrieving objects.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Source file does not exist.
    #[error("Source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// Object does not exist in the store.
    #[error("Object not found: {category}/{name}")]
    ObjectNotFound { category: String, name: String },

    /// Failed to copy a file into the store.
    #[error("Failed to copy {from} to {destination}: {reason}")]
    CopyFailed {
        from: PathBuf,
        destination: PathBuf,
        reason: String,
    },

    /// Failed to create a storage directory.
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn copy_failed(
        from: PathBuf,
        destination: PathBuf,
        error: impl std::fmt::Display,
    ) -> Self {
        Self::CopyFailed {
            from,
            destination,
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_failed_carries_both_paths() {
        let e = StorageError::copy_failed(
            PathBuf::from("/tmp/upload.mp4"),
            PathBuf::from("/media/originals/upload.mp4"),
            "permission denied",
        );
        let msg = e.to_string();
        assert!(msg.contains("/tmp/upload.mp4"));
        assert!(msg.contains("/media/originals/upload.mp4"));
        assert!(msg.contains("permission denied"));
        // The paths are plain data, not a wrapped error.
        assert!(std::error::Error::source(&e).is_none());
    }
}
