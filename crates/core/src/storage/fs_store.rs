//! File system object store implementation.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};

use super::config::StorageConfig;
use super::error::StorageError;
use super::traits::ObjectStore;
use super::types::{FileCategory, StoredObject};

/// File system based object store.
pub struct FsObjectStore {
    config: StorageConfig,
}

impl FsObjectStore {
    /// Creates a new file system store with the given configuration.
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Creates a store with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(StorageConfig::default())
    }

    fn object_path(&self, category: FileCategory, name: &str) -> PathBuf {
        self.config.root_dir.join(category.as_str()).join(name)
    }

    /// Attempts to move a file atomically (rename).
    async fn try_atomic_move(source: &Path, destination: &Path) -> Result<bool, std::io::Error> {
        match fs::rename(source, destination).await {
            Ok(()) => Ok(true),
            Err(e) => {
                // Cross-filesystem moves fail with EXDEV (18 on Linux).
                if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) {
                    Ok(false)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Copies a file with optional checksum calculation.
    async fn copy_file(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<(u64, Option<String>), StorageError> {
        let source_file = File::open(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::SourceNotFound {
                    path: source.to_path_buf(),
                }
            } else {
                StorageError::Io(e)
            }
        })?;

        let dest_file = File::create(destination).await.map_err(|e| {
            StorageError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
        })?;

        let mut reader = BufReader::with_capacity(self.config.buffer_size, source_file);
        let mut writer = BufWriter::with_capacity(self.config.buffer_size, dest_file);

        let mut hasher = if self.config.compute_checksums {
            Some(Sha256::new())
        } else {
            None
        };

        let mut total_bytes = 0u64;
        let mut buffer = vec![0u8; self.config.buffer_size];

        loop {
            let bytes_read = reader.read(&mut buffer).await.map_err(|e| {
                StorageError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
            })?;

            if bytes_read == 0 {
                break;
            }

            if let Some(ref mut h) = hasher {
                h.update(&buffer[..bytes_read]);
            }

            writer.write_all(&buffer[..bytes_read]).await.map_err(|e| {
                StorageError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
            })?;

            total_bytes += bytes_read as u64;
        }

        writer.flush().await.map_err(|e| {
            StorageError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
        })?;

        let checksum = hasher.map(|h| format!("{:x}", h.finalize()));

        Ok((total_bytes, checksum))
    }

    /// Calculates the SHA-256 of a file.
    async fn calculate_checksum(&self, path: &Path) -> Result<String, StorageError> {
        let file = File::open(path).await?;
        let mut reader = BufReader::with_capacity(self.config.buffer_size, file);
        let mut buffer = vec![0u8; self.config.buffer_size];
        let mut hasher = Sha256::new();

        loop {
            let bytes_read = reader.read(&mut buffer).await?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn name(&self) -> &str {
        "fs"
    }

    async fn put_file(
        &self,
        category: FileCategory,
        name: &str,
        source: &Path,
    ) -> Result<StoredObject, StorageError> {
        if !source.exists() {
            return Err(StorageError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }

        let destination = self.object_path(category, name);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let (size_bytes, checksum) = if self.config.prefer_atomic_moves
            && Self::try_atomic_move(source, &destination).await?
        {
            let meta = fs::metadata(&destination).await?;
            let checksum = if self.config.compute_checksums {
                Some(self.calculate_checksum(&destination).await?)
            } else {
                None
            };
            (meta.len(), checksum)
        } else {
            let (size, checksum) = self.copy_file(source, &destination).await?;
            if source.exists() {
                if let Err(e) = fs::remove_file(source).await {
                    tracing::warn!(
                        "Failed to remove source file {} after copy: {}",
                        source.display(),
                        e
                    );
                }
            }
            (size, checksum)
        };

        Ok(StoredObject {
            category,
            name: name.to_string(),
            path: destination,
            size_bytes,
            checksum,
        })
    }

    fn url(&self, category: FileCategory, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            category.as_str(),
            name
        )
    }

    fn path(&self, category: FileCategory, name: &str) -> PathBuf {
        self.object_path(category, name)
    }

    async fn delete(&self, category: FileCategory, name: &str) -> Result<(), StorageError> {
        let path = self.object_path(category, name);
        fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::ObjectNotFound {
                    category: category.to_string(),
                    name: name.to_string(),
                }
            } else {
                StorageError::Io(e)
            }
        })
    }

    async fn exists(&self, category: FileCategory, name: &str) -> bool {
        self.object_path(category, name).exists()
    }

    async fn validate(&self) -> Result<(), StorageError> {
        for category in [
            FileCategory::Originals,
            FileCategory::Compressed,
            FileCategory::Thumbnails,
        ] {
            let dir = self.config.root_dir.join(category.as_str());
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| StorageError::DirectoryCreationFailed {
                    path: dir.clone(),
                    source: e,
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> FsObjectStore {
        FsObjectStore::new(StorageConfig::with_root(temp.path().join("media")))
    }

    #[tokio::test]
    async fn test_put_file_moves_source() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("upload.mp4");
        fs::write(&source, "video bytes").await.unwrap();

        let store = store_in(&temp);
        let stored = store
            .put_file(FileCategory::Originals, "abc123.mp4", &source)
            .await
            .unwrap();

        assert_eq!(stored.size_bytes, 11);
        assert!(stored.path.exists());
        assert!(stored.path.ends_with("originals/abc123.mp4"));
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn test_put_file_copy_fallback() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("upload.mp4");
        fs::write(&source, "video bytes").await.unwrap();

        let store = FsObjectStore::new(
            StorageConfig::with_root(temp.path().join("media")).with_atomic_moves(false),
        );
        let stored = store
            .put_file(FileCategory::Compressed, "abc123.mp4", &source)
            .await
            .unwrap();

        assert!(stored.path.exists());
        // Source is consumed either way.
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn test_put_file_missing_source() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        let result = store
            .put_file(
                FileCategory::Originals,
                "x.mp4",
                &temp.path().join("missing.mp4"),
            )
            .await;
        assert!(matches!(result, Err(StorageError::SourceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_checksum_computed_when_enabled() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("upload.mp4");
        fs::write(&source, "checksummed content").await.unwrap();

        let store = FsObjectStore::new(
            StorageConfig::with_root(temp.path().join("media"))
                .with_atomic_moves(false)
                .with_checksums(true),
        );
        let stored = store
            .put_file(FileCategory::Originals, "c.mp4", &source)
            .await
            .unwrap();
        assert!(stored.checksum.is_some());
        assert_eq!(stored.checksum.unwrap().len(), 64);
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("thumb.jpg");
        fs::write(&source, "jpeg").await.unwrap();

        let store = store_in(&temp);
        store
            .put_file(FileCategory::Thumbnails, "t.jpg", &source)
            .await
            .unwrap();

        assert!(store.exists(FileCategory::Thumbnails, "t.jpg").await);
        store.delete(FileCategory::Thumbnails, "t.jpg").await.unwrap();
        assert!(!store.exists(FileCategory::Thumbnails, "t.jpg").await);

        let result = store.delete(FileCategory::Thumbnails, "t.jpg").await;
        assert!(matches!(result, Err(StorageError::ObjectNotFound { .. })));
    }

    #[tokio::test]
    async fn test_url() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        assert_eq!(
            store.url(FileCategory::Compressed, "v1.mp4"),
            "/media/compressed/v1.mp4"
        );
    }

    #[tokio::test]
    async fn test_validate_creates_category_dirs() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        store.validate().await.unwrap();
        assert!(temp.path().join("media/originals").exists());
        assert!(temp.path().join("media/compressed").exists());
        assert!(temp.path().join("media/thumbnails").exists());
    }
}
