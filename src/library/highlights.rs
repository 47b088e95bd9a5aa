//! Highlight store
//!
//! Validates highlight input and applies the ownership rules: creating
//! and listing go through the document gate, while update and delete are
//! gated on ownership of the highlight itself.

use sqlx::SqlitePool;
use uuid::Uuid;

use super::registry::DocumentRegistry;
use crate::db::{
    now_timestamp, CreateHighlight, Highlight, HighlightPatch, HighlightRepository,
    DEFAULT_HIGHLIGHT_COLOR,
};
use crate::error::{AppError, Result};
use crate::geometry::FractionalBox;
use crate::storage::BlobStore;

/// Longest accepted color value (`#rrggbbaa`, `rgba(...)`, named colors)
const MAX_COLOR_LEN: usize = 64;

pub struct HighlightStore<'a> {
    pool: &'a SqlitePool,
    registry: DocumentRegistry<'a>,
}

impl<'a> HighlightStore<'a> {
    pub fn new(pool: &'a SqlitePool, blobs: &'a dyn BlobStore) -> Self {
        Self {
            pool,
            registry: DocumentRegistry::new(pool, blobs),
        }
    }

    /// Create a highlight on a document the caller owns
    pub async fn create(&self, user_id: &str, data: CreateHighlight) -> Result<Highlight> {
        let document = self.registry.resolve_owned(user_id, &data.document_id).await?;

        validate_page_number(data.page_number)?;
        validate_text(&data.highlighted_text)?;
        validate_box(&data.bounding_box)?;
        let color = match data.color {
            Some(color) => validate_color(color)?,
            None => DEFAULT_HIGHLIGHT_COLOR.to_string(),
        };

        let now = now_timestamp();
        let highlight = Highlight {
            id: Uuid::new_v4().to_string(),
            document_id: document.id,
            user_id: user_id.to_string(),
            page_number: data.page_number,
            highlighted_text: data.highlighted_text,
            bounding_box: data.bounding_box,
            color,
            created_at: now.clone(),
            updated_at: now,
        };

        HighlightRepository::new(self.pool).insert(&highlight).await?;

        tracing::debug!(
            highlight_id = %highlight.id,
            document_id = %highlight.document_id,
            page = highlight.page_number,
            "Highlight created"
        );

        Ok(highlight)
    }

    /// List the caller's highlights for a document, ordered by page
    pub async fn list_by_document(&self, user_id: &str, document_id: &str) -> Result<Vec<Highlight>> {
        let document = self.registry.resolve_owned(user_id, document_id).await?;
        HighlightRepository::new(self.pool)
            .list_for_document(&document.id, user_id)
            .await
    }

    /// Count the caller's highlights for a document
    pub async fn count_by_document(&self, user_id: &str, document_id: &str) -> Result<i64> {
        let document = self.registry.resolve_owned(user_id, document_id).await?;
        HighlightRepository::new(self.pool)
            .count_for_document(&document.id, user_id)
            .await
    }

    /// Apply a partial update; an empty patch returns the record untouched
    pub async fn update(
        &self,
        user_id: &str,
        highlight_id: &str,
        patch: HighlightPatch,
    ) -> Result<Highlight> {
        let repo = HighlightRepository::new(self.pool);
        let mut highlight = repo
            .get_owned(highlight_id, user_id)
            .await?
            .ok_or_else(AppError::highlight_not_found)?;

        let patch = HighlightPatch {
            highlighted_text: patch.highlighted_text.map(validate_text_owned).transpose()?,
            bounding_box: patch
                .bounding_box
                .map(|b| validate_box(&b).map(|_| b))
                .transpose()?,
            color: patch.color.map(validate_color).transpose()?,
        };

        if !highlight.apply(&patch) {
            return Ok(highlight);
        }

        highlight.updated_at = now_timestamp();
        if !repo.save(&highlight).await? {
            // Deleted between the read and the write
            return Err(AppError::highlight_not_found());
        }

        Ok(highlight)
    }

    /// Delete one of the caller's highlights
    pub async fn delete(&self, user_id: &str, highlight_id: &str) -> Result<()> {
        let deleted = HighlightRepository::new(self.pool)
            .delete(highlight_id, user_id)
            .await?;

        if deleted {
            Ok(())
        } else {
            Err(AppError::highlight_not_found())
        }
    }
}

fn validate_page_number(page_number: i64) -> Result<()> {
    if page_number < 1 {
        return Err(AppError::Validation(
            "pageNumber must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(AppError::Validation(
            "highlightedText must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_text_owned(text: String) -> Result<String> {
    validate_text(&text).map(|_| text)
}

fn validate_box(bounding_box: &FractionalBox) -> Result<()> {
    bounding_box.check().map_err(AppError::Validation)
}

fn validate_color(color: String) -> Result<String> {
    let trimmed = color.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_COLOR_LEN {
        return Err(AppError::Validation(format!(
            "color must be 1-{} characters",
            MAX_COLOR_LEN
        )));
    }
    Ok(trimmed.to_string())
}
