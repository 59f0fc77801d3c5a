//! Lifecycle events
//!
//! Every feature module owns an [`EventBus`]; the orchestrator subscribes to
//! each one and republishes on its own bus, so hosts observe a single stream.

use tokio::sync::broadcast;

use crate::domain::user::User;

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Lifecycle event emitted by a feature module. The payload is always the
/// user the event concerns, as it looked right after the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignupPost(User),
    SignupConfirm(User),
    Login(User),
    Logout(User),
    ForgotSent(User),
    ForgotSuccess(User),
    EmailChangeRequested(User),
    EmailChanged(User),
    Delete(User),
}

impl AuthEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::SignupPost(_) => "signup::post",
            AuthEvent::SignupConfirm(_) => "signup::confirm",
            AuthEvent::Login(_) => "login",
            AuthEvent::Logout(_) => "logout",
            AuthEvent::ForgotSent(_) => "forgot::sent",
            AuthEvent::ForgotSuccess(_) => "forgot::success",
            AuthEvent::EmailChangeRequested(_) => "email::request",
            AuthEvent::EmailChanged(_) => "email::change",
            AuthEvent::Delete(_) => "delete",
        }
    }

    pub fn user(&self) -> &User {
        match self {
            AuthEvent::SignupPost(user)
            | AuthEvent::SignupConfirm(user)
            | AuthEvent::Login(user)
            | AuthEvent::Logout(user)
            | AuthEvent::ForgotSent(user)
            | AuthEvent::ForgotSuccess(user)
            | AuthEvent::EmailChangeRequested(user)
            | AuthEvent::EmailChanged(user)
            | AuthEvent::Delete(user) => user,
        }
    }
}

/// Publish/subscribe surface over a tokio broadcast channel.
///
/// Cloning shares the channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AuthEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to current subscribers; returns how many received it.
    /// Events emitted with no subscriber are dropped.
    pub fn emit(&self, event: AuthEvent) -> usize {
        tracing::trace!(event = event.name(), user = %event.user().name, "emit");
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
