//! Feature Modules
//!
//! Reference implementations of the five workflows. Each module is built from
//! a [`FeatureContext`], owns its own [`EventBus`] and exposes its routes with
//! state already applied.

pub mod change_email;
pub mod delete_account;
pub mod dto;
pub mod forgot_password;
pub mod login;
pub mod session;
pub mod signup;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::application::config::Settings;
use crate::domain::adapter::SharedAdapter;
use crate::domain::event::EventBus;
use crate::domain::feature::{FeatureKind, FeatureModule};
use crate::domain::mail::{MailMessage, SharedMailer};
use crate::error::{AuthKitError, AuthKitResult};
use crate::infra::stub_mail::StubTransport;

pub use change_email::ChangeEmailModule;
pub use delete_account::DeleteAccountModule;
pub use forgot_password::ForgotPasswordModule;
pub use login::LoginModule;
pub use session::{CurrentUser, SessionRegistry, SessionUser};
pub use signup::SignupModule;

/// Everything a module handler needs. Cloned into each route's state.
#[derive(Clone)]
pub struct FeatureContext {
    pub settings: Arc<Settings>,
    pub adapter: SharedAdapter,
    pub events: EventBus,
    pub mailer: SharedMailer,
    pub sessions: SessionRegistry,
}

impl FeatureContext {
    /// Fresh event bus, stub mailer and a private session registry
    pub fn new(settings: Arc<Settings>, adapter: SharedAdapter) -> Self {
        Self {
            settings,
            adapter,
            events: EventBus::default(),
            mailer: Arc::new(StubTransport),
            sessions: SessionRegistry::default(),
        }
    }

    pub fn with_mailer(mut self, mailer: SharedMailer) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn with_sessions(mut self, sessions: SessionRegistry) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.events = EventBus::new(capacity);
        self
    }

    pub(crate) async fn send_mail(
        &self,
        to: &str,
        subject: &str,
        body: String,
    ) -> AuthKitResult<()> {
        let message = MailMessage {
            from: self.settings.mail.email_from.clone(),
            to: to.to_string(),
            subject: format!("[{}] {}", self.settings.appname, subject),
            body,
        };
        self.mailer.send(message).await
    }
}

/// Construct the module for `kind`
pub fn build_module(kind: FeatureKind, ctx: FeatureContext) -> Arc<dyn FeatureModule> {
    match kind {
        FeatureKind::Signup => Arc::new(SignupModule::from_context(ctx)),
        FeatureKind::Login => Arc::new(LoginModule::from_context(ctx)),
        FeatureKind::ForgotPassword => Arc::new(ForgotPasswordModule::from_context(ctx)),
        FeatureKind::ChangeEmail => Arc::new(ChangeEmailModule::from_context(ctx)),
        FeatureKind::DeleteAccount => Arc::new(DeleteAccountModule::from_context(ctx)),
    }
}

/// Random URL-safe token
pub(crate) fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

pub(crate) fn expires_in(ttl: Duration) -> DateTime<Utc> {
    Utc::now() + ttl
}

pub(crate) fn require(field: &str, value: &str) -> AuthKitResult<()> {
    if value.trim().is_empty() {
        return Err(AuthKitError::BadRequest(format!("{} is required", field)));
    }
    Ok(())
}

/// `{route}/{token}` path template
pub(crate) fn token_path(route: &str) -> String {
    format!("{}/{{token}}", route.trim_end_matches('/'))
}
