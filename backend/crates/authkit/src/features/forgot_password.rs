//! Forgot Password
//!
//! `POST {route}` mails a reset link, `POST {route}/{token}` sets the new
//! password. `GET {route}/{token}` is left to the fallback router, which
//! serves the page holding the reset form.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::Method;
use axum::routing::post;
use chrono::Utc;
use platform::password::ClearTextPassword;

use crate::application::config::Settings;
use crate::domain::adapter::SharedAdapter;
use crate::domain::email::Email;
use crate::domain::event::{AuthEvent, EventBus};
use crate::domain::feature::{FeatureKind, FeatureModule, Route};
use crate::domain::user::{Lookup, is_expired};
use crate::error::{AuthKitError, AuthKitResult};
use crate::features::dto::{EmailRequest, MessageResponse, ResetPasswordRequest};
use crate::features::{FeatureContext, expires_in, new_token, token_path};

pub struct ForgotPasswordModule {
    ctx: FeatureContext,
}

impl ForgotPasswordModule {
    pub fn new(settings: Arc<Settings>, adapter: SharedAdapter) -> Self {
        Self::from_context(FeatureContext::new(settings, adapter))
    }

    pub fn from_context(ctx: FeatureContext) -> Self {
        Self { ctx }
    }
}

impl FeatureModule for ForgotPasswordModule {
    fn kind(&self) -> FeatureKind {
        FeatureKind::ForgotPassword
    }

    fn routes(&self) -> Vec<Route> {
        let route = &self.ctx.settings.forgot_password.route;
        vec![
            Route::new(
                Method::POST,
                route,
                post(request_reset).with_state(self.ctx.clone()),
            ),
            Route::new(
                Method::POST,
                token_path(route),
                post(reset_password).with_state(self.ctx.clone()),
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

/// POST {forgotPassword.route}
async fn request_reset(
    State(ctx): State<FeatureContext>,
    Json(req): Json<EmailRequest>,
) -> AuthKitResult<Json<MessageResponse>> {
    let email = Email::new(req.email)?;

    if let Some(mut user) = ctx.adapter.find(Lookup::Email, email.as_str()).await? {
        let token = new_token();
        user.pw_token = Some(token.clone());
        user.pw_token_expires = Some(expires_in(ctx.settings.forgot_password.token_ttl()));
        ctx.adapter.update(&user).await?;

        let link = ctx.settings.link(&ctx.settings.forgot_password.route, &token);
        ctx.send_mail(
            &user.email,
            "Reset your password",
            format!("Choose a new password here: {}", link),
        )
        .await?;

        ctx.events.emit(AuthEvent::ForgotSent(user));
    }

    Ok(Json(MessageResponse::new(
        "If the address is registered, a reset link was sent",
    )))
}

/// POST {forgotPassword.route}/{token}
async fn reset_password(
    State(ctx): State<FeatureContext>,
    Path(token): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> AuthKitResult<Json<MessageResponse>> {
    let mut user = ctx
        .adapter
        .find(Lookup::PasswordToken, &token)
        .await?
        .ok_or(AuthKitError::TokenInvalid)?;

    if is_expired(user.pw_token_expires, Utc::now()) {
        return Err(AuthKitError::TokenExpired);
    }

    let password = ClearTextPassword::new(req.password)?;
    user.password_hash = password.hash()?.as_phc_string().to_string();
    user.pw_token = None;
    user.pw_token_expires = None;
    user.failed_login_attempts = 0;
    user.account_locked_until = None;
    ctx.adapter.update(&user).await?;

    let closed = ctx.sessions.destroy_user(&user.name).await;
    tracing::info!(user = %user.name, sessions_closed = closed, "Password reset");
    ctx.events.emit(AuthEvent::ForgotSuccess(user));

    Ok(Json(MessageResponse::new("Password updated")))
}
