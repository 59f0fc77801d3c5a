//! Change Email
//!
//! The new address only replaces the old one after its owner follows the
//! link mailed to it.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::Method;
use axum::routing::{get, post};
use chrono::Utc;

use crate::application::config::Settings;
use crate::domain::adapter::SharedAdapter;
use crate::domain::email::Email;
use crate::domain::event::{AuthEvent, EventBus};
use crate::domain::feature::{FeatureKind, FeatureModule, Route};
use crate::domain::user::{Lookup, User, is_expired};
use crate::error::{AuthKitError, AuthKitResult};
use crate::features::dto::{EmailRequest, MessageResponse};
use crate::features::session::CurrentUser;
use crate::features::{FeatureContext, expires_in, new_token, token_path};

pub struct ChangeEmailModule {
    ctx: FeatureContext,
}

impl ChangeEmailModule {
    pub fn new(settings: Arc<Settings>, adapter: SharedAdapter) -> Self {
        Self::from_context(FeatureContext::new(settings, adapter))
    }

    pub fn from_context(ctx: FeatureContext) -> Self {
        Self { ctx }
    }
}

impl FeatureModule for ChangeEmailModule {
    fn kind(&self) -> FeatureKind {
        FeatureKind::ChangeEmail
    }

    fn routes(&self) -> Vec<Route> {
        let route = &self.ctx.settings.change_email.route;
        vec![
            Route::new(
                Method::POST,
                route,
                post(request_change).with_state(self.ctx.clone()),
            ),
            Route::new(
                Method::GET,
                token_path(route),
                get(confirm_change).with_state(self.ctx.clone()),
            ),
        ]
    }

    fn events(&self) -> &EventBus {
        &self.ctx.events
    }

    fn adapter(&self) -> &SharedAdapter {
        &self.ctx.adapter
    }

    fn settings(&self) -> &Arc<Settings> {
        &self.ctx.settings
    }
}

/// POST {changeEmail.route}
async fn request_change(
    State(ctx): State<FeatureContext>,
    CurrentUser(session): CurrentUser,
    Json(req): Json<EmailRequest>,
) -> AuthKitResult<Json<MessageResponse>> {
    let email = Email::new(req.email)?;

    let mut user = ctx
        .adapter
        .find(Lookup::Name, &session.user.name)
        .await?
        .ok_or(AuthKitError::UserNotFound)?;

    if user.email == email.as_str() {
        return Err(AuthKitError::BadRequest(
            "New email equals the current one".to_string(),
        ));
    }
    ensure_available(&ctx, &user, email.as_str()).await?;

    let token = new_token();
    user.pending_email = Some(email.into_inner());
    user.email_token = Some(token.clone());
    user.email_token_expires = Some(expires_in(ctx.settings.change_email.token_ttl()));
    ctx.adapter.update(&user).await?;

    let link = ctx.settings.link(&ctx.settings.change_email.route, &token);
    if let Some(pending) = &user.pending_email {
        ctx.send_mail(
            pending,
            "Confirm your new email",
            format!("Confirm your new email address: {}", link),
        )
        .await?;
    }

    ctx.events.emit(AuthEvent::EmailChangeRequested(user));

    Ok(Json(MessageResponse::new(
        "A confirmation link was sent to the new address",
    )))
}

/// GET {changeEmail.route}/{token}
async fn confirm_change(
    State(ctx): State<FeatureContext>,
    Path(token): Path<String>,
) -> AuthKitResult<Json<User>> {
    let mut user = ctx
        .adapter
        .find(Lookup::EmailToken, &token)
        .await?
        .ok_or(AuthKitError::TokenInvalid)?;

    if is_expired(user.email_token_expires, Utc::now()) {
        return Err(AuthKitError::TokenExpired);
    }

    let pending = user.pending_email.take().ok_or(AuthKitError::TokenInvalid)?;
    ensure_available(&ctx, &user, &pending).await?;

    let previous = std::mem::replace(&mut user.email, pending);
    user.email_verified = true;
    user.email_token = None;
    user.email_token_expires = None;
    ctx.adapter.update(&user).await?;

    tracing::info!(user = %user.name, from = %previous, to = %user.email, "Email changed");
    ctx.events.emit(AuthEvent::EmailChanged(user.clone()));

    Ok(Json(user))
}

async fn ensure_available(ctx: &FeatureContext, user: &User, email: &str) -> AuthKitResult<()> {
    match ctx.adapter.find(Lookup::Email, email).await? {
        Some(owner) if owner.id != user.id => Err(AuthKitError::EmailTaken),
        _ => Ok(()),
    }
}
