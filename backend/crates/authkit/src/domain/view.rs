//! View engine contract used by the fallback router

use serde_json::Value;

use crate::error::AuthKitResult;

/// Host-provided template renderer.
pub trait ViewEngine: Send + Sync {
    fn render(&self, template: &str, context: &Value) -> AuthKitResult<String>;
}
