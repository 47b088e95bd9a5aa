//! Document API routes
//!
//! Endpoints:
//! - POST   /api/v1/documents      - Upload a PDF (multipart field `pdf` or `file`)
//! - GET    /api/v1/documents      - List the caller's documents
//! - GET    /api/v1/documents/:id  - Download the PDF bytes
//! - PATCH  /api/v1/documents/:id  - Rename
//! - DELETE /api/v1/documents/:id  - Delete with all highlights

use axum::{
    body::Body,
    extract::{
        multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, Multipart, Path,
        State,
    },
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::db::Document;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Multipart framing overhead allowed on top of the file itself
const MULTIPART_SLACK: usize = 64 * 1024;

/// Create the documents router
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(list_documents).post(upload_document))
        .route(
            "/:id",
            get(download_document)
                .patch(rename_document)
                .delete(delete_document),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_SLACK))
}

/// Rename request; `newName` is accepted for older clients
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameRequest {
    #[serde(alias = "newName")]
    file_name: String,
}

/// Upload a new PDF
async fn upload_document(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Document>)> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        let filename = field.file_name().map(|s| s.to_string());
        let content_type = field.content_type().map(|s| s.to_string());

        tracing::debug!(
            "Received field: name='{}', filename={:?}, content_type={:?}",
            name,
            filename,
            content_type
        );

        if name != "pdf" && name != "file" {
            continue;
        }

        if let Some(ref ct) = content_type {
            if ct != "application/pdf" && ct != "application/octet-stream" {
                return Err(AppError::Validation("Only PDF files are accepted".to_string()));
            }
        }

        let filename = filename.unwrap_or_else(|| "document.pdf".to_string());
        let data = field.bytes().await.map_err(multipart_error)?;

        let document = state
            .registry()
            .upload(
                user.id(),
                &filename,
                data.to_vec(),
                state.config().server.max_upload_bytes,
            )
            .await?;

        return Ok((StatusCode::CREATED, Json(document)));
    }

    tracing::warn!("No file field found in multipart upload");
    Err(AppError::Validation(
        "No file provided. Use field name 'pdf' or 'file'".to_string(),
    ))
}

/// List the caller's documents
async fn list_documents(State(state): State<AppState>, user: AuthUser) -> Result<Json<Vec<Document>>> {
    let documents = state.registry().list(user.id()).await?;
    Ok(Json(documents))
}

/// Stream a PDF back to its owner
async fn download_document(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Response> {
    let (document, data) = state.registry().open(user.id(), &id).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CONTENT_LENGTH, data.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", disposition_name(&document.file_name)),
        )
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Rename a document
async fn rename_document(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    payload: std::result::Result<Json<RenameRequest>, JsonRejection>,
) -> Result<Json<Document>> {
    let Json(request) = payload?;
    let document = state
        .registry()
        .rename(user.id(), &id, &request.file_name)
        .await?;
    Ok(Json(document))
}

/// Delete a document and everything anchored to it
async fn delete_document(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.registry().delete_cascade(user.id(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Only the body length limit is a 413; anything else is a malformed request
fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!("Upload exceeded the body limit: {}", e);
        AppError::PayloadTooLarge(format!("Upload too large: {}", e.body_text()))
    } else {
        tracing::warn!("Failed to read multipart body: {}", e);
        AppError::Validation(format!("Invalid multipart body: {}", e.body_text()))
    }
}

/// Keep a display name safe inside a quoted header value
fn disposition_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() || !c.is_ascii() { '_' } else { c })
        .collect()
}
