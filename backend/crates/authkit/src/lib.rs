//! AuthKit: authentication workflows behind one router
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, events and collaborator contracts
//! - `application/` - Configuration merging, adapter resolution, composition
//! - `infra/` - In-memory store, backend registry, stub mail transport
//! - `features/` - Signup, Login, ForgotPassword, ChangeEmail, DeleteAccount
//! - `presentation/` - Unified pipeline, fallback router, middleware
//!
//! ## Composition
//! - Configuration is deep-merged over defaults and frozen into `Settings`
//! - One storage adapter, resolved once, is shared by every module
//! - Module routes are mounted in a fixed order; the first claimant of a
//!   `(method, path)` pair wins, fallback routes come last
//! - Module events are republished on a single stream
//!
//! ```no_run
//! # async fn run() -> authkit::AuthKitResult<()> {
//! let kit = authkit::AuthKit::builder(serde_json::json!({})).build().await?;
//! let app = axum::Router::new().nest("/auth", kit.router());
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod domain;
pub mod error;
pub mod features;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::compose::{AuthKit, AuthKitBuilder, ComposeState};
pub use application::config::Settings;
pub use domain::{
    AuthEvent, EventBus, FeatureKind, FeatureModule, Lookup, MailMessage, MailTransport, Route,
    SharedAdapter, StorageAdapter, User, ViewEngine,
};
pub use error::{AuthKitError, AuthKitResult};
pub use infra::{BackendRegistry, MemoryStore, StubTransport};

// Re-export kernel error types for unified error handling
pub use kernel::error::{app_error::AppError, kind::ErrorKind};

pub mod config {
    pub use crate::application::config::*;
}

#[cfg(test)]
mod tests;
