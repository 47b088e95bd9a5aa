//! Document database operations

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::Result;

/// Uploaded PDF record
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    #[serde(skip)]
    pub user_id: String,
    pub file_name: String,
    #[serde(skip)]
    pub storage_key: String,
    pub file_size: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Document repository
///
/// Every lookup is scoped to the owning user.
pub struct DocumentRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DocumentRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new document record
    pub async fn insert(&self, document: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, user_id, file_name, storage_key, file_size, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&document.id)
        .bind(&document.user_id)
        .bind(&document.file_name)
        .bind(&document.storage_key)
        .bind(document.file_size)
        .bind(&document.created_at)
        .bind(&document.updated_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Get a document if it belongs to `user_id`
    pub async fn get_owned(&self, id: &str, user_id: &str) -> Result<Option<Document>> {
        let document = sqlx::query_as::<_, Document>(
            r#"
            SELECT id, user_id, file_name, storage_key, file_size, created_at, updated_at
            FROM documents
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(document)
    }

    /// List a user's documents, newest first
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Document>> {
        let documents = sqlx::query_as::<_, Document>(
            r#"
            SELECT id, user_id, file_name, storage_key, file_size, created_at, updated_at
            FROM documents
            WHERE user_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(documents)
    }

    /// Change the display name
    pub async fn rename(
        &self,
        id: &str,
        user_id: &str,
        file_name: &str,
        updated_at: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE documents SET file_name = ?, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(file_name)
        .bind(updated_at)
        .bind(id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete the record on an open connection (normally inside a transaction)
    pub async fn delete_on(conn: &mut SqliteConnection, id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
