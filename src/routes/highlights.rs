//! Highlights API routes

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::db::{CreateHighlight, Highlight, HighlightPatch};
use crate::error::Result;
use crate::state::AppState;

/// Create the highlights router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_highlight))
        .route("/document/:document_id", get(list_document_highlights))
        .route("/document/:document_id/count", get(count_highlights))
        .route("/:id", patch(update_highlight).delete(delete_highlight))
}

#[derive(Serialize)]
struct CountResponse {
    count: i64,
}

/// Create a new highlight
async fn create_highlight(
    State(state): State<AppState>,
    user: AuthUser,
    payload: std::result::Result<Json<CreateHighlight>, JsonRejection>,
) -> Result<(StatusCode, Json<Highlight>)> {
    let Json(data) = payload?;
    let highlight = state.highlights().create(user.id(), data).await?;
    Ok((StatusCode::CREATED, Json(highlight)))
}

/// List highlights for a document, ordered by page
async fn list_document_highlights(
    State(state): State<AppState>,
    user: AuthUser,
    Path(document_id): Path<String>,
) -> Result<Json<Vec<Highlight>>> {
    let highlights = state
        .highlights()
        .list_by_document(user.id(), &document_id)
        .await?;
    Ok(Json(highlights))
}

/// Count highlights for a document
async fn count_highlights(
    State(state): State<AppState>,
    user: AuthUser,
    Path(document_id): Path<String>,
) -> Result<Json<CountResponse>> {
    let count = state
        .highlights()
        .count_by_document(user.id(), &document_id)
        .await?;
    Ok(Json(CountResponse { count }))
}

/// Update a highlight
async fn update_highlight(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    payload: std::result::Result<Json<HighlightPatch>, JsonRejection>,
) -> Result<Json<Highlight>> {
    let Json(patch) = payload?;
    let highlight = state.highlights().update(user.id(), &id, patch).await?;
    Ok(Json(highlight))
}

/// Delete a highlight
async fn delete_highlight(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.highlights().delete(user.id(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
