//! Route modules for PDF Shelf Server

pub mod documents;
pub mod health;
pub mod highlights;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router
pub fn app(state: AppState) -> Router {
    let max_upload_bytes = state.config().server.max_upload_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/health", get(health::health_check))
        .nest("/api/v1/documents", documents::router(max_upload_bytes))
        .nest("/api/v1/highlights", highlights::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::auth::StaticTokenAuthenticator;
    use crate::config::Config;
    use crate::db::test_pool;
    use crate::state::AppState;
    use crate::storage::LocalBlobStore;

    pub const ALICE: &str = "alice-token";
    pub const BOB: &str = "bob-token";

    /// Router over an in-memory database and a temporary upload directory
    pub async fn test_app() -> (Router, TempDir) {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::create(dir.path().to_path_buf()).await.unwrap();
        let auth = StaticTokenAuthenticator::new([
            (ALICE.to_string(), "alice".to_string()),
            (BOB.to_string(), "bob".to_string()),
        ]);
        let mut config = Config::default();
        config.server.max_upload_bytes = 1024 * 1024;

        let state = AppState::new(config, test_pool().await, Arc::new(blobs), Arc::new(auth));
        (super::app(state), dir)
    }

    pub async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        json: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match json {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    pub async fn send_json(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        json: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, bytes) = send(app, method, uri, token, json).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Upload a PDF through the multipart endpoint, returning the new document id
    pub async fn upload_pdf(app: &Router, token: &str, file_name: &str, data: &[u8]) -> (StatusCode, Value) {
        let boundary = "pdfshelf-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"pdf\"; filename=\"{f}\"\r\nContent-Type: application/pdf\r\n\r\n",
                b = boundary,
                f = file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        send_multipart(app, token, body).await
    }

    /// Post a raw multipart body framed with the test boundary
    pub async fn send_multipart(app: &Router, token: &str, body: Vec<u8>) -> (StatusCode, Value) {
        let boundary = "pdfshelf-test-boundary";
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/documents")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}
