//! Presentation Layer
//!
//! Unified pipeline, fallback router and context-enrichment middleware.

pub mod fallback;
pub mod middleware;
pub mod pipeline;

pub use fallback::EntryDocument;
pub use middleware::{SessionState, ViewContext};
pub use pipeline::{Pipeline, RouteEntry, RouteOrigin};
