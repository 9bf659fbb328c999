/// Blob storage backend
///
/// Media payloads live outside the database, addressed by an opaque blob
/// key. The retention sweeper only ever needs deletion, so the trait is
/// deliberately narrow. Deleting a key that is already gone is a success;
/// the sweeper must be able to re-run after a partial failure.
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Deletion interface for blob backends
#[async_trait]
pub trait StorageDeleter: Send + Sync {
    /// Remove a blob. Missing blobs are not an error.
    async fn remove(&self, blob_key: &str) -> AppResult<()>;
}

/// Filesystem-backed blob storage
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub async fn new(root: &Path) -> AppResult<Self> {
        tokio::fs::create_dir_all(root).await?;

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Resolve a blob key to a path under the store root
    fn blob_path(&self, blob_key: &str) -> AppResult<PathBuf> {
        // Keys are opaque identifiers, never paths.
        if blob_key.is_empty()
            || blob_key.contains('/')
            || blob_key.contains('\\')
            || blob_key.contains("..")
        {
            return Err(AppError::Storage(format!("Invalid blob key: {}", blob_key)));
        }

        Ok(self.root.join(blob_key))
    }
}

#[async_trait]
impl StorageDeleter for DiskStore {
    async fn remove(&self, blob_key: &str) -> AppResult<()> {
        let path = self.blob_path(blob_key)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(blob_key, "Blob already absent");
                Ok(())
            }
            Err(e) => Err(AppError::Storage(format!(
                "Failed to delete blob {}: {}",
                blob_key, e
            ))),
        }
    }
}
