//! Document registry
//!
//! Owns the ownership gate every document-scoped operation goes through,
//! plus the upload / rename / delete lifecycle of stored PDFs.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{now_timestamp, Document, DocumentRepository, HighlightRepository};
use crate::error::{AppError, Result, StorageError};
use crate::storage::{new_pdf_key, BlobStore};

/// Every PDF starts with this header
const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// Longest display name accepted on upload or rename
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Document registry over the database and blob store
pub struct DocumentRegistry<'a> {
    pool: &'a SqlitePool,
    blobs: &'a dyn BlobStore,
}

impl<'a> DocumentRegistry<'a> {
    pub fn new(pool: &'a SqlitePool, blobs: &'a dyn BlobStore) -> Self {
        Self { pool, blobs }
    }

    /// Resolve a document the caller owns.
    ///
    /// Missing and foreign documents produce the same error.
    pub async fn resolve_owned(&self, user_id: &str, document_id: &str) -> Result<Document> {
        DocumentRepository::new(self.pool)
            .get_owned(document_id, user_id)
            .await?
            .ok_or_else(AppError::document_not_found)
    }

    /// Store an uploaded PDF and record it for `user_id`
    pub async fn upload(
        &self,
        user_id: &str,
        file_name: &str,
        data: Vec<u8>,
        max_bytes: usize,
    ) -> Result<Document> {
        let file_name = validate_file_name(file_name)?;
        if data.len() > max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "File exceeds the {} byte upload limit",
                max_bytes
            )));
        }
        if !data.starts_with(PDF_SIGNATURE) {
            return Err(AppError::Validation("Only PDF files are accepted".to_string()));
        }

        let now = now_timestamp();
        let document = Document {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            file_name,
            storage_key: new_pdf_key(),
            file_size: data.len() as i64,
            created_at: now.clone(),
            updated_at: now,
        };

        self.blobs.put(&document.storage_key, data).await?;

        if let Err(e) = DocumentRepository::new(self.pool).insert(&document).await {
            // Don't leave unreferenced bytes behind
            if let Err(cleanup) = self.blobs.delete(&document.storage_key).await {
                tracing::warn!(
                    key = %document.storage_key,
                    "Failed to remove blob after insert failure: {}",
                    cleanup
                );
            }
            return Err(e);
        }

        tracing::info!(
            document_id = %document.id,
            user_id = %user_id,
            size = document.file_size,
            "Document uploaded"
        );

        Ok(document)
    }

    /// List the caller's documents, newest first
    pub async fn list(&self, user_id: &str) -> Result<Vec<Document>> {
        DocumentRepository::new(self.pool).list_for_user(user_id).await
    }

    /// Fetch a document together with its bytes
    pub async fn open(&self, user_id: &str, document_id: &str) -> Result<(Document, Vec<u8>)> {
        let document = self.resolve_owned(user_id, document_id).await?;
        let data = self.blobs.get(&document.storage_key).await?;
        Ok((document, data))
    }

    /// Change a document's display name
    pub async fn rename(&self, user_id: &str, document_id: &str, new_name: &str) -> Result<Document> {
        let new_name = validate_file_name(new_name)?;
        let repo = DocumentRepository::new(self.pool);

        if !repo
            .rename(document_id, user_id, &new_name, &now_timestamp())
            .await?
        {
            return Err(AppError::document_not_found());
        }

        self.resolve_owned(user_id, document_id).await
    }

    /// Delete a document, its stored bytes and all of its highlights.
    ///
    /// Bytes go first; the record and highlights are removed in one
    /// transaction so no listing can observe highlights without a document.
    pub async fn delete_cascade(&self, user_id: &str, document_id: &str) -> Result<u64> {
        let document = self.resolve_owned(user_id, document_id).await?;

        match self.blobs.delete(&document.storage_key).await {
            Ok(()) => {}
            Err(StorageError::ObjectNotFound(key)) => {
                tracing::warn!(document_id = %document_id, key = %key, "Stored bytes already missing");
            }
            Err(e) => return Err(e.into()),
        }

        let mut tx = self.pool.begin().await?;
        let removed = HighlightRepository::delete_for_document(&mut *tx, &document.id).await?;
        if !DocumentRepository::delete_on(&mut *tx, &document.id, user_id).await? {
            return Err(AppError::document_not_found());
        }
        tx.commit().await?;

        tracing::info!(
            document_id = %document_id,
            highlights = removed,
            "Document deleted"
        );

        Ok(removed)
    }
}

fn validate_file_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("File name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_FILE_NAME_LEN {
        return Err(AppError::Validation(format!(
            "File name must be at most {} characters",
            MAX_FILE_NAME_LEN
        )));
    }
    Ok(name.to_string())
}
