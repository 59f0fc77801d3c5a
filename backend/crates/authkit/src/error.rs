//! AuthKit Error Types
//!
//! Composition failures and request-level failures share one enum so that
//! feature handlers, the fallback router and the orchestrator all propagate
//! with `?`. Only the composition variants ever cross `AuthKitBuilder::build`.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

pub type AuthKitResult<T> = Result<T, AuthKitError>;

#[derive(Debug, Error)]
pub enum AuthKitError {
    // ------------------------------------------------------------------
    // Composition
    // ------------------------------------------------------------------
    /// No constructor registered for the backend identifier
    #[error("Unknown storage backend: {0}")]
    UnknownBackend(String),

    /// The backend constructor reported a failure
    #[error("Storage adapter construction failed: {0}")]
    AdapterInit(String),

    #[error("Storage adapter construction timed out after {0:?}")]
    AdapterTimeout(Duration),

    /// Merged configuration does not fit the settings schema
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------
    #[error("{0}")]
    BadRequest(String),

    #[error("User name already exists")]
    UserNameTaken,

    #[error("Email already registered")]
    EmailTaken,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is temporarily locked")]
    AccountLocked,

    #[error("Email address not verified")]
    EmailNotVerified,

    #[error("Invalid or unknown token")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    /// No session user on a route that needs one
    #[error("Authentication required")]
    Unauthorized,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Mail delivery failed: {0}")]
    Mail(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthKitError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthKitError::BadRequest(_) => ErrorKind::BadRequest,
            AuthKitError::UserNameTaken | AuthKitError::EmailTaken => ErrorKind::Conflict,
            AuthKitError::UserNotFound => ErrorKind::NotFound,
            AuthKitError::InvalidCredentials | AuthKitError::Unauthorized => {
                ErrorKind::Unauthorized
            }
            AuthKitError::AccountLocked => ErrorKind::Locked,
            AuthKitError::EmailNotVerified => ErrorKind::Forbidden,
            AuthKitError::TokenInvalid => ErrorKind::NotFound,
            AuthKitError::TokenExpired => ErrorKind::Gone,
            AuthKitError::Mail(_) => ErrorKind::BadGateway,
            AuthKitError::Storage(_) => ErrorKind::ServiceUnavailable,
            AuthKitError::UnknownBackend(_)
            | AuthKitError::AdapterInit(_)
            | AuthKitError::AdapterTimeout(_)
            | AuthKitError::InvalidConfig(_)
            | AuthKitError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    pub fn to_app_error(&self) -> AppError {
        let err = AppError::new(self.kind(), self.to_string());
        match self {
            AuthKitError::TokenExpired => err.with_action("Request a new link"),
            AuthKitError::EmailNotVerified => err.with_action("Check your inbox for the verification link"),
            _ => err,
        }
    }

    fn log(&self) {
        match self {
            AuthKitError::Storage(msg) => {
                tracing::error!(message = %msg, "Storage adapter error");
            }
            AuthKitError::Mail(msg) => {
                tracing::error!(message = %msg, "Mail transport error");
            }
            AuthKitError::Internal(msg) => {
                tracing::error!(message = %msg, "AuthKit internal error");
            }
            AuthKitError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            AuthKitError::AccountLocked => {
                tracing::warn!("Login attempt on locked account");
            }
            _ => {
                tracing::debug!(error = %self, "AuthKit error");
            }
        }
    }
}

impl IntoResponse for AuthKitError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<AppError> for AuthKitError {
    fn from(err: AppError) -> Self {
        match err.kind() {
            ErrorKind::BadRequest => AuthKitError::BadRequest(err.message().to_string()),
            _ => AuthKitError::Internal(err.to_string()),
        }
    }
}

impl From<platform::password::PasswordPolicyError> for AuthKitError {
    fn from(err: platform::password::PasswordPolicyError) -> Self {
        AuthKitError::BadRequest(err.to_string())
    }
}

impl From<platform::password::PasswordHashError> for AuthKitError {
    fn from(err: platform::password::PasswordHashError) -> Self {
        AuthKitError::Internal(err.to_string())
    }
}
