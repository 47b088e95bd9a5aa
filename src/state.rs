//! Application state management

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::Authenticator;
use crate::config::Config;
use crate::library::{DocumentRegistry, HighlightStore};
use crate::storage::{BlobStore, SharedBlobStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    db: SqlitePool,
    blobs: SharedBlobStore,
    authenticator: Arc<dyn Authenticator>,
}

impl AppState {
    /// Create a new application state
    pub fn new(
        config: Config,
        db: SqlitePool,
        blobs: SharedBlobStore,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                blobs,
                authenticator,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the database pool
    pub fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    /// Get the blob store
    pub fn blobs(&self) -> &dyn BlobStore {
        self.inner.blobs.as_ref()
    }

    /// Get the request authenticator
    pub fn authenticator(&self) -> &dyn Authenticator {
        self.inner.authenticator.as_ref()
    }

    /// Document registry bound to this state
    pub fn registry(&self) -> DocumentRegistry<'_> {
        DocumentRegistry::new(self.db(), self.blobs())
    }

    /// Highlight store bound to this state
    pub fn highlights(&self) -> HighlightStore<'_> {
        HighlightStore::new(self.db(), self.blobs())
    }
}
