//! Request authentication
//!
//! Token issuance lives outside this server. Requests carry
//! `Authorization: Bearer <token>` and an [`Authenticator`] maps the token
//! to a user id, which is then trusted as-is.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::config::AuthConfig;
use crate::error::AppError;
use crate::state::AppState;

/// Resolves bearer tokens to user ids
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Option<String>;
}

/// Fixed token table loaded from configuration
#[derive(Debug, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, String>,
}

impl StaticTokenAuthenticator {
    pub fn new(tokens: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        if config.tokens.is_empty() {
            tracing::warn!("No AUTH_TOKENS configured; every API request will be rejected");
        }
        Self::new(config.tokens.iter().cloned())
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, token: &str) -> Option<String> {
        self.tokens.get(token).cloned()
    }
}

/// The authenticated caller, extracted from the request headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.0
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthenticated("Missing bearer token".to_string()))?;

        state
            .authenticator()
            .authenticate(token)
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthenticated("Invalid token".to_string()))
    }
}
