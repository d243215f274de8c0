//! Types for the storage module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage category an object belongs to. Each category maps to its own
/// subdirectory under the storage root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Originals,
    Compressed,
    Thumbnails,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Originals => "originals",
            Self::Compressed => "compressed",
            Self::Thumbnails => "thumbnails",
        }
    }
}

impl std::fmt::Display for FileCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file placed into the object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    pub category: FileCategory,
    pub name: String,
    /// Absolute path of the stored object.
    pub path: PathBuf,
    pub size_bytes: u64,
    /// SHA-256 of the stored content, when checksumming is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}
