//! Highlight API seam used by the annotation session

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};

use crate::db::{CreateHighlight, Highlight, HighlightPatch};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Highlight operations on behalf of one authenticated user
#[async_trait]
pub trait HighlightApi: Send + Sync {
    async fn list(&self, document_id: &str) -> Result<Vec<Highlight>>;

    async fn create(&self, data: &CreateHighlight) -> Result<Highlight>;

    async fn update(&self, highlight_id: &str, patch: &HighlightPatch) -> Result<Highlight>;

    async fn delete(&self, highlight_id: &str) -> Result<()>;
}

/// Talks to the server's REST API
pub struct HttpHighlightClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

/// Error body returned by the server
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl HttpHighlightClient {
    /// `base_url` is the server root, e.g. `http://localhost:3000`
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/highlights{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.message)
            .unwrap_or_default();
        Err(error_from_status(status, message))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| AppError::Internal(format!("Invalid response body: {}", e)))
    }
}

/// Rebuild the typed error from a server response status
fn error_from_status(status: StatusCode, message: String) -> AppError {
    let message = if message.is_empty() {
        status.canonical_reason().unwrap_or("Request failed").to_string()
    } else {
        message
    };

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => AppError::Validation(message),
        StatusCode::UNAUTHORIZED => AppError::Unauthenticated(message),
        StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => AppError::NotFound(message),
        StatusCode::PAYLOAD_TOO_LARGE => AppError::PayloadTooLarge(message),
        _ => AppError::Internal(format!("{} ({})", message, status)),
    }
}

#[async_trait]
impl HighlightApi for HttpHighlightClient {
    async fn list(&self, document_id: &str) -> Result<Vec<Highlight>> {
        let url = self.url(&format!("/document/{}", document_id));
        self.send_json(self.client.get(url)).await
    }

    async fn create(&self, data: &CreateHighlight) -> Result<Highlight> {
        self.send_json(self.client.post(self.url("")).json(data)).await
    }

    async fn update(&self, highlight_id: &str, patch: &HighlightPatch) -> Result<Highlight> {
        let url = self.url(&format!("/{}", highlight_id));
        self.send_json(self.client.patch(url).json(patch)).await
    }

    async fn delete(&self, highlight_id: &str) -> Result<()> {
        let url = self.url(&format!("/{}", highlight_id));
        self.send(self.client.delete(url)).await?;
        Ok(())
    }
}

/// Calls the highlight store directly, for embedding and tests
pub struct LocalHighlightApi {
    state: AppState,
    user_id: String,
}

impl LocalHighlightApi {
    pub fn new(state: AppState, user_id: impl Into<String>) -> Self {
        Self {
            state,
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl HighlightApi for LocalHighlightApi {
    async fn list(&self, document_id: &str) -> Result<Vec<Highlight>> {
        self.state
            .highlights()
            .list_by_document(&self.user_id, document_id)
            .await
    }

    async fn create(&self, data: &CreateHighlight) -> Result<Highlight> {
        self.state
            .highlights()
            .create(&self.user_id, data.clone())
            .await
    }

    async fn update(&self, highlight_id: &str, patch: &HighlightPatch) -> Result<Highlight> {
        self.state
            .highlights()
            .update(&self.user_id, highlight_id, patch.clone())
            .await
    }

    async fn delete(&self, highlight_id: &str) -> Result<()> {
        self.state
            .highlights()
            .delete(&self.user_id, highlight_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::auth::StaticTokenAuthenticator;
    use crate::config::Config;
    use crate::db::test_pool;
    use crate::geometry::{PageSize, PixelRect, Point};
    use crate::session::{AnnotationSession, SessionState};
    use crate::storage::LocalBlobStore;

    async fn local_state() -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::create(dir.path().to_path_buf()).await.unwrap();
        let state = AppState::new(
            Config::default(),
            test_pool().await,
            Arc::new(blobs),
            Arc::new(StaticTokenAuthenticator::default()),
        );
        (state, dir)
    }

    #[tokio::test]
    async fn test_session_over_local_api() {
        let (state, _dir) = local_state().await;
        let doc = state
            .registry()
            .upload("alice", "paper.pdf", b"%PDF-1.4\n".to_vec(), 1024)
            .await
            .unwrap();

        let alice = LocalHighlightApi::new(state.clone(), "alice");
        let session = AnnotationSession::open(doc.id.clone())
            .document_loaded(3)
            .page_rendered(PageSize::new(600.0, 800.0))
            .refresh(&alice)
            .await;
        assert_eq!(session.state(), &SessionState::Ready);

        let session = session
            .select("quoted", &[PixelRect::new(60.0, 80.0, 300.0, 16.0)], Point::default())
            .save(&alice, None)
            .await;
        assert_eq!(session.highlights().len(), 1);

        let stored = state
            .highlights()
            .list_by_document("alice", &doc.id)
            .await
            .unwrap();
        assert_eq!(stored, session.highlights());

        // Another user cannot even load the highlight list
        let bob = LocalHighlightApi::new(state.clone(), "bob");
        let session = AnnotationSession::open(doc.id.clone())
            .document_loaded(3)
            .refresh(&bob)
            .await;
        assert!(matches!(session.state(), SessionState::Error(_)));
    }

    #[test]
    fn test_error_from_status() {
        assert!(matches!(
            error_from_status(StatusCode::BAD_REQUEST, "bad".to_string()),
            AppError::Validation(m) if m == "bad"
        ));
        assert!(error_from_status(StatusCode::NOT_FOUND, String::new()).is_not_found());
        assert!(matches!(
            error_from_status(StatusCode::UNAUTHORIZED, String::new()),
            AppError::Unauthenticated(m) if m == "Unauthorized"
        ));
        assert!(matches!(
            error_from_status(StatusCode::BAD_GATEWAY, "down".to_string()),
            AppError::Internal(_)
        ));
    }

    #[test]
    fn test_url_building() {
        let client = HttpHighlightClient::new("http://localhost:3000/", "token");
        assert_eq!(client.url(""), "http://localhost:3000/api/v1/highlights");
        assert_eq!(
            client.url("/document/abc"),
            "http://localhost:3000/api/v1/highlights/document/abc"
        );
    }
}
