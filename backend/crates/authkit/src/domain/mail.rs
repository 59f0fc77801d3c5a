//! Mail transport contract

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AuthKitResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outgoing mail used for verification, reset and email-change links.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Transport identifier, matches `mail.emailType`
    fn kind(&self) -> &str;

    async fn send(&self, message: MailMessage) -> AuthKitResult<()>;
}

pub type SharedMailer = Arc<dyn MailTransport>;
