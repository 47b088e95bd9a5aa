//! Local filesystem blob storage

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;

use super::BlobStore;
use crate::error::StorageError;

/// Stores each blob as a flat file under a base directory
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    /// Open the store, creating the directory if it does not exist
    pub async fn create(base_path: PathBuf) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(&base_path).await?;
        tracing::info!("Local blob store at {}", base_path.display());
        Ok(Self { base_path })
    }

    /// Resolve a key to a path, refusing anything that could escape the base directory
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\'])
            && !key.contains("..");
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(key))
    }
}

fn map_io(key: &str, err: std::io::Error) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::ObjectNotFound(key.to_string())
    } else {
        StorageError::Filesystem(err)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::write(&path, data).await?;
        tracing::debug!(key = %key, "Stored blob");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|e| map_io(key, e))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| map_io(key, e))?;
        tracing::debug!(key = %key, "Deleted blob");
        Ok(())
    }
}
