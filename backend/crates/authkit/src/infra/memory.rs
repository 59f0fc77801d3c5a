//! In-process Storage Adapter
//!
//! Backs the ephemeral descriptor. Records live in a `RwLock`ed map keyed by
//! user name and vanish with the process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::application::config::Settings;
use crate::domain::adapter::{SharedAdapter, StorageAdapter};
use crate::domain::user::{Lookup, User};
use crate::error::{AuthKitError, AuthKitResult};

/// Registry identifier of the in-memory backend
pub const MEMORY_BACKEND: &str = "memory";

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collection: String,
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl MemoryStore {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            users: Arc::default(),
        }
    }

    /// Registry constructor
    pub async fn connect(settings: Arc<Settings>) -> AuthKitResult<SharedAdapter> {
        let collection = settings
            .db
            .as_ref()
            .map(|db| db.collection.clone())
            .unwrap_or_default();

        tracing::debug!(collection = %collection, "Opening in-memory user store");
        Ok(Arc::new(Self::new(collection)))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl StorageAdapter for MemoryStore {
    fn backend(&self) -> &str {
        MEMORY_BACKEND
    }

    async fn save(&self, user: User) -> AuthKitResult<User> {
        let mut users = self.users.write().await;

        if users.contains_key(&user.name) {
            return Err(AuthKitError::UserNameTaken);
        }
        if users.values().any(|u| u.email == user.email) {
            return Err(AuthKitError::EmailTaken);
        }

        users.insert(user.name.clone(), user.clone());
        Ok(user)
    }

    async fn find(&self, lookup: Lookup, value: &str) -> AuthKitResult<Option<User>> {
        let users = self.users.read().await;

        let found = match lookup {
            Lookup::Name => users.get(value).cloned(),
            _ => users
                .values()
                .find(|u| u.field(lookup) == Some(value))
                .cloned(),
        };
        Ok(found)
    }

    async fn update(&self, user: &User) -> AuthKitResult<()> {
        let mut users = self.users.write().await;

        let key = users
            .iter()
            .find(|(_, stored)| stored.id == user.id)
            .map(|(key, _)| key.clone())
            .ok_or(AuthKitError::UserNotFound)?;

        if users
            .values()
            .any(|other| other.id != user.id && other.email == user.email)
        {
            return Err(AuthKitError::EmailTaken);
        }

        users.remove(&key);
        users.insert(user.name.clone(), user.clone());
        Ok(())
    }

    async fn remove(&self, name: &str) -> AuthKitResult<()> {
        self.users
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or(AuthKitError::UserNotFound)
    }
}
