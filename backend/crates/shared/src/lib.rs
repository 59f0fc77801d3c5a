//! Shared Kernel
//!
//! Vocabulary shared by every crate in the workspace:
//! - The unified [`error::app_error::AppError`] and its result alias
//! - [`error::kind::ErrorKind`], the HTTP-facing error classification
//!
//! Anything placed here must mean the same thing to the composition layer,
//! the feature modules and the hosting application.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
