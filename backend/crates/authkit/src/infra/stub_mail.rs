//! Stub mail transport: logs the message and delivers nothing.

use async_trait::async_trait;

use crate::application::config::STUB_EMAIL_TYPE;
use crate::domain::mail::{MailMessage, MailTransport};
use crate::error::AuthKitResult;

#[derive(Debug, Clone, Copy, Default)]
pub struct StubTransport;

#[async_trait]
impl MailTransport for StubTransport {
    fn kind(&self) -> &str {
        STUB_EMAIL_TYPE
    }

    async fn send(&self, message: MailMessage) -> AuthKitResult<()> {
        tracing::debug!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "Stub transport swallowed message"
        );
        Ok(())
    }
}
