//! Application Layer
//!
//! Configuration merging, adapter resolution and composition orchestration.

pub mod compose;
pub mod config;
pub mod resolver;

// Re-exports
pub use compose::{AuthKit, AuthKitBuilder, ComposeState, quickstart_link};
pub use config::Settings;
pub use resolver::AdapterResolver;
