//! Storage Adapter contract
//!
//! The adapter is opaque to the orchestrator: it is resolved once, then
//! handed to every feature module, which performs its own lookups and writes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::user::{Lookup, User};
use crate::error::AuthKitResult;

/// Persistence backend shared by all feature modules.
///
/// Implementations own their concurrency control.
#[async_trait]
pub trait StorageAdapter: Send + Sync + 'static {
    /// Backend identifier, for logs
    fn backend(&self) -> &str;

    /// Persist a new user; duplicates fail with `UserNameTaken` / `EmailTaken`
    async fn save(&self, user: User) -> AuthKitResult<User>;

    async fn find(&self, lookup: Lookup, value: &str) -> AuthKitResult<Option<User>>;

    /// Replace the stored record with the same id
    async fn update(&self, user: &User) -> AuthKitResult<()>;

    /// Delete by user name
    async fn remove(&self, name: &str) -> AuthKitResult<()>;
}

pub type SharedAdapter = Arc<dyn StorageAdapter>;
