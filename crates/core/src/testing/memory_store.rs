//! In-memory object store for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::storage::{FileCategory, ObjectStore, StorageError, StoredObject};

/// Object store that keeps content in a map.
///
/// `put_file` still consumes the source file like the real store does,
/// so pipeline temp handling is exercised. The configured root is only
/// used to fabricate paths.
pub struct MemoryObjectStore {
    root: PathBuf,
    objects: Mutex<HashMap<(FileCategory, String), Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            objects: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the stored bytes for an object, if present.
    pub fn get(&self, category: FileCategory, name: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(category, name.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put_file(
        &self,
        category: FileCategory,
        name: &str,
        source: &Path,
    ) -> Result<StoredObject, StorageError> {
        let content = tokio::fs::read(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::SourceNotFound {
                    path: source.to_path_buf(),
                }
            } else {
                StorageError::Io(e)
            }
        })?;
        tokio::fs::remove_file(source).await?;

        let size_bytes = content.len() as u64;
        self.objects
            .lock()
            .unwrap()
            .insert((category, name.to_string()), content);

        Ok(StoredObject {
            category,
            name: name.to_string(),
            path: self.path(category, name),
            size_bytes,
            checksum: None,
        })
    }

    fn url(&self, category: FileCategory, name: &str) -> String {
        format!("/media/{}/{}", category.as_str(), name)
    }

    fn path(&self, category: FileCategory, name: &str) -> PathBuf {
        self.root.join(category.as_str()).join(name)
    }

    async fn delete(&self, category: FileCategory, name: &str) -> Result<(), StorageError> {
        self.objects
            .lock()
            .unwrap()
            .remove(&(category, name.to_string()))
            .map(|_| ())
            .ok_or_else(|| StorageError::ObjectNotFound {
                category: category.to_string(),
                name: name.to_string(),
            })
    }

    async fn exists(&self, category: FileCategory, name: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&(category, name.to_string()))
    }

    async fn validate(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
