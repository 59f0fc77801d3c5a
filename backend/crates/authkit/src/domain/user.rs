//! User entity

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Field a [`crate::domain::StorageAdapter::find`] call matches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    Name,
    Email,
    SignupToken,
    PasswordToken,
    EmailToken,
}

/// Stored account record.
///
/// Secrets (password hash, pending tokens) are skipped when the user is
/// serialized into a response or an event consumer's log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email_verified: bool,

    #[serde(skip_serializing)]
    pub signup_token: Option<String>,
    pub signup_token_expires: Option<DateTime<Utc>>,

    #[serde(skip_serializing)]
    pub pw_token: Option<String>,
    pub pw_token_expires: Option<DateTime<Utc>>,

    pub pending_email: Option<String>,
    #[serde(skip_serializing)]
    pub email_token: Option<String>,
    pub email_token_expires: Option<DateTime<Utc>>,

    pub failed_login_attempts: u32,
    pub account_locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            email_verified: false,
            signup_token: None,
            signup_token_expires: None,
            pw_token: None,
            pw_token_expires: None,
            pending_email: None,
            email_token: None,
            email_token_expires: None,
            failed_login_attempts: 0,
            account_locked_until: None,
            created_at: Utc::now(),
        }
    }

    /// Value of the field selected by `lookup`
    pub fn field(&self, lookup: Lookup) -> Option<&str> {
        match lookup {
            Lookup::Name => Some(&self.name),
            Lookup::Email => Some(&self.email),
            Lookup::SignupToken => self.signup_token.as_deref(),
            Lookup::PasswordToken => self.pw_token.as_deref(),
            Lookup::EmailToken => self.email_token.as_deref(),
        }
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.account_locked_until.is_some_and(|until| until > now)
    }
}

/// True once `expires` lies in the past; a missing expiry counts as expired.
pub fn is_expired(expires: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires.is_none_or(|at| at <= now)
}
