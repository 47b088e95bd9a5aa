//! Highlights database operations

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::Result;
use crate::geometry::FractionalBox;

/// Color used when a highlight is created without one
pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#ffff00";

/// Highlight record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub id: String,
    pub document_id: String,
    pub user_id: String,
    /// 1-indexed page number
    pub page_number: i64,
    pub highlighted_text: String,
    pub bounding_box: FractionalBox,
    pub color: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Highlight {
    /// Merge the fields present in `patch`; returns whether anything changed
    pub fn apply(&mut self, patch: &HighlightPatch) -> bool {
        let mut changed = false;

        if let Some(ref text) = patch.highlighted_text {
            changed |= *text != self.highlighted_text;
            self.highlighted_text = text.clone();
        }
        if let Some(bounding_box) = patch.bounding_box {
            changed |= bounding_box != self.bounding_box;
            self.bounding_box = bounding_box;
        }
        if let Some(ref color) = patch.color {
            changed |= *color != self.color;
            self.color = color.clone();
        }

        changed
    }
}

/// Create highlight request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHighlight {
    pub document_id: String,
    pub page_number: i64,
    pub highlighted_text: String,
    pub bounding_box: FractionalBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Update highlight request
///
/// Only these fields are mutable; anything else in the payload is rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HighlightPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlighted_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<FractionalBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl HighlightPatch {
    pub fn is_empty(&self) -> bool {
        self.highlighted_text.is_none() && self.bounding_box.is_none() && self.color.is_none()
    }
}

/// Internal row type for SQLite queries
#[derive(sqlx::FromRow)]
struct HighlightRow {
    id: String,
    document_id: String,
    user_id: String,
    page_number: i64,
    highlighted_text: String,
    box_x: f64,
    box_y: f64,
    box_width: f64,
    box_height: f64,
    color: String,
    created_at: String,
    updated_at: String,
}

impl From<HighlightRow> for Highlight {
    fn from(row: HighlightRow) -> Self {
        Highlight {
            id: row.id,
            document_id: row.document_id,
            user_id: row.user_id,
            page_number: row.page_number,
            highlighted_text: row.highlighted_text,
            bounding_box: FractionalBox::new(row.box_x, row.box_y, row.box_width, row.box_height),
            color: row.color,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, document_id, user_id, page_number, highlighted_text,
           box_x, box_y, box_width, box_height, color, created_at, updated_at
    FROM highlights
"#;

/// Highlight repository
///
/// Lookups take the caller's user id; a highlight owned by someone else
/// behaves exactly like a missing one.
pub struct HighlightRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> HighlightRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a highlight owned by `user_id`
    pub async fn get_owned(&self, id: &str, user_id: &str) -> Result<Option<Highlight>> {
        let sql = format!("{} WHERE id = ? AND user_id = ?", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, HighlightRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Highlight::from))
    }

    /// List a user's highlights for a document, by page then creation time
    pub async fn list_for_document(
        &self,
        document_id: &str,
        user_id: &str,
    ) -> Result<Vec<Highlight>> {
        let sql = format!(
            "{} WHERE document_id = ? AND user_id = ? ORDER BY page_number ASC, created_at ASC, id ASC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, HighlightRow>(&sql)
            .bind(document_id)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Highlight::from).collect())
    }

    /// Insert a fully-formed highlight
    pub async fn insert(&self, highlight: &Highlight) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO highlights (
                id, document_id, user_id, page_number, highlighted_text,
                box_x, box_y, box_width, box_height, color, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&highlight.id)
        .bind(&highlight.document_id)
        .bind(&highlight.user_id)
        .bind(highlight.page_number)
        .bind(&highlight.highlighted_text)
        .bind(highlight.bounding_box.x)
        .bind(highlight.bounding_box.y)
        .bind(highlight.bounding_box.width)
        .bind(highlight.bounding_box.height)
        .bind(&highlight.color)
        .bind(&highlight.created_at)
        .bind(&highlight.updated_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Write back the mutable fields of a highlight owned by its `user_id`
    pub async fn save(&self, highlight: &Highlight) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE highlights
            SET highlighted_text = ?, box_x = ?, box_y = ?, box_width = ?, box_height = ?,
                color = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(&highlight.highlighted_text)
        .bind(highlight.bounding_box.x)
        .bind(highlight.bounding_box.y)
        .bind(highlight.bounding_box.width)
        .bind(highlight.bounding_box.height)
        .bind(&highlight.color)
        .bind(&highlight.updated_at)
        .bind(&highlight.id)
        .bind(&highlight.user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a highlight owned by `user_id`
    pub async fn delete(&self, id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM highlights WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count a user's highlights for a document
    pub async fn count_for_document(&self, document_id: &str, user_id: &str) -> Result<i64> {
        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM highlights WHERE document_id = ? AND user_id = ?",
        )
        .bind(document_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(result.0)
    }

    /// Delete every highlight of a document, on an open connection
    pub async fn delete_for_document(conn: &mut SqliteConnection, document_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM highlights WHERE document_id = ?")
            .bind(document_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{now_timestamp, test_pool};
    use uuid::Uuid;

    fn highlight(document_id: &str, user_id: &str, page_number: i64) -> Highlight {
        let now = now_timestamp();
        Highlight {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            user_id: user_id.to_string(),
            page_number,
            highlighted_text: format!("text on page {}", page_number),
            bounding_box: FractionalBox::new(0.1, 0.2, 0.3, 0.05),
            color: DEFAULT_HIGHLIGHT_COLOR.to_string(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let pool = test_pool().await;
        let repo = HighlightRepository::new(&pool);

        let h = highlight("doc-1", "alice", 2);
        repo.insert(&h).await.unwrap();

        let loaded = repo.get_owned(&h.id, "alice").await.unwrap().unwrap();
        assert_eq!(loaded, h);
        assert!(repo.get_owned(&h.id, "bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_orders_by_page() {
        let pool = test_pool().await;
        let repo = HighlightRepository::new(&pool);

        for page in [5, 1, 3] {
            repo.insert(&highlight("doc-1", "alice", page)).await.unwrap();
        }
        repo.insert(&highlight("doc-2", "alice", 2)).await.unwrap();
        repo.insert(&highlight("doc-1", "bob", 2)).await.unwrap();

        let pages: Vec<i64> = repo
            .list_for_document("doc-1", "alice")
            .await
            .unwrap()
            .iter()
            .map(|h| h.page_number)
            .collect();
        assert_eq!(pages, vec![1, 3, 5]);
        assert_eq!(repo.count_for_document("doc-1", "alice").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_save_and_delete_are_owner_scoped() {
        let pool = test_pool().await;
        let repo = HighlightRepository::new(&pool);

        let mut h = highlight("doc-1", "alice", 1);
        repo.insert(&h).await.unwrap();

        h.color = "#00ff00".to_string();
        assert!(repo.save(&h).await.unwrap());
        assert_eq!(
            repo.get_owned(&h.id, "alice").await.unwrap().unwrap().color,
            "#00ff00"
        );

        assert!(!repo.delete(&h.id, "bob").await.unwrap());
        assert!(repo.delete(&h.id, "alice").await.unwrap());
        assert!(!repo.delete(&h.id, "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_for_document() {
        let pool = test_pool().await;
        let repo = HighlightRepository::new(&pool);

        for page in 1..=3 {
            repo.insert(&highlight("doc-1", "alice", page)).await.unwrap();
        }
        repo.insert(&highlight("doc-2", "alice", 1)).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let removed = HighlightRepository::delete_for_document(&mut *conn, "doc-1")
            .await
            .unwrap();
        drop(conn);

        assert_eq!(removed, 3);
        assert_eq!(repo.count_for_document("doc-2", "alice").await.unwrap(), 1);
    }

    #[test]
    fn test_apply_patch() {
        let mut h = highlight("doc-1", "alice", 1);
        let original = h.clone();

        assert!(!h.apply(&HighlightPatch::default()));
        assert_eq!(h, original);

        let patch = HighlightPatch {
            color: Some("#ff0000".to_string()),
            ..Default::default()
        };
        assert!(h.apply(&patch));
        assert_eq!(h.color, "#ff0000");
        assert_eq!(h.highlighted_text, original.highlighted_text);
        assert_eq!(h.bounding_box, original.bounding_box);
    }

    #[test]
    fn test_patch_rejects_unknown_fields() {
        let err = serde_json::from_str::<HighlightPatch>(r#"{"userId": "mallory"}"#);
        assert!(err.is_err());

        let patch: HighlightPatch =
            serde_json::from_str(r##"{"color": "#ff0000"}"##).unwrap();
        assert_eq!(patch.color.as_deref(), Some("#ff0000"));
        assert!(patch.highlighted_text.is_none());
    }
}
