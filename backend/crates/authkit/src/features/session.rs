//! Server-side sessions
//!
//! Opaque cookie tokens mapped to user names. Shared by the login,
//! forgot-password and delete-account modules and by the session middleware.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use tokio::sync::RwLock;

use crate::domain::user::User;
use crate::error::AuthKitError;
use crate::features::new_token;

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, String>>>,
}

impl SessionRegistry {
    /// Open a session for `name` and return its token
    pub async fn create(&self, name: &str) -> String {
        let token = new_token();
        self.sessions
            .write()
            .await
            .insert(token.clone(), name.to_string());
        token
    }

    pub async fn lookup(&self, token: &str) -> Option<String> {
        self.sessions.read().await.get(token).cloned()
    }

    /// Close one session; returns the user name it belonged to
    pub async fn destroy(&self, token: &str) -> Option<String> {
        self.sessions.write().await.remove(token)
    }

    /// Close every session of `name`; returns how many were closed
    pub async fn destroy_user(&self, name: &str) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, owner| owner != name);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// User attached to the request by the session middleware.
///
/// `token` is `None` when the host inserted the user itself.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub user: User,
    pub token: Option<String>,
}

/// Extractor for routes that need a signed-in user
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionUser);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthKitError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AuthKitError::Unauthorized)
    }
}

impl<S> OptionalFromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<SessionUser>().cloned().map(CurrentUser))
    }
}
