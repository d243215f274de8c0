//! Trait definitions for the storage module.

use async_trait::async_trait;
use std::path::Path;

use super::error::StorageError;
use super::types::{FileCategory, StoredObject};

/// Durable storage for video artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the name of this implementation.
    fn name(&self) -> &str;

    /// Moves or copies `source` into the store under `category/name`.
    ///
    /// The source file is consumed: after a successful put it no longer
    /// exists at its original location.
    async fn put_file(
        &self,
        category: FileCategory,
        name: &str,
        source: &Path,
    ) -> Result<StoredObject, StorageError>;

    /// Returns the URL under which a stored object is served.
    fn url(&self, category: FileCategory, name: &str) -> String;

    /// Returns the filesystem path of a stored object.
    fn path(&self, category: FileCategory, name: &str) -> std::path::PathBuf;

    /// Removes an object from the store.
    async fn delete(&self, category: FileCategory, name: &str) -> Result<(), StorageError>;

    /// Whether an object exists in the store.
    async fn exists(&self, category: FileCategory, name: &str) -> bool;

    /// Validates that the store is usable (directories writable etc).
    async fn validate(&self) -> Result<(), StorageError>;
}
