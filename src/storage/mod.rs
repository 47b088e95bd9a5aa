//! Blob storage for uploaded PDF bytes
//!
//! Supports the local filesystem and S3-compatible backends (MinIO,
//! Cloudflare R2, Backblaze B2, AWS S3).

mod local;
mod s3_client;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

pub use local::LocalBlobStore;
pub use s3_client::S3BlobStore;

use crate::config::StorageConfig;
use crate::error::{AppError, Result, StorageError};

/// Trait for blob storage backends
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `key`
    async fn put(&self, key: &str, data: Vec<u8>) -> std::result::Result<(), StorageError>;

    /// Read the bytes stored under `key`
    async fn get(&self, key: &str) -> std::result::Result<Vec<u8>, StorageError>;

    /// Remove the bytes stored under `key`
    async fn delete(&self, key: &str) -> std::result::Result<(), StorageError>;
}

/// Shared handle to the configured blob store
pub type SharedBlobStore = Arc<dyn BlobStore>;

/// Allocate a fresh storage key for an uploaded PDF
pub fn new_pdf_key() -> String {
    format!("{}.pdf", Uuid::new_v4())
}

/// Build the blob store selected by configuration
pub async fn from_config(config: &StorageConfig) -> Result<SharedBlobStore> {
    if config.provider.is_object_store() {
        let s3 = config.s3.as_ref().ok_or_else(|| {
            AppError::Internal("S3 settings missing for object storage provider".to_string())
        })?;
        let store = S3BlobStore::new(s3).await?;
        Ok(Arc::new(store))
    } else {
        let store = LocalBlobStore::create(config.upload_dir.clone()).await?;
        Ok(Arc::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pdf_key_is_unique() {
        let a = new_pdf_key();
        let b = new_pdf_key();
        assert!(a.ends_with(".pdf"));
        assert_ne!(a, b);
    }
}
