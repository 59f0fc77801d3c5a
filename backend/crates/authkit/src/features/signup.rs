//! Signup
//!
//! - `POST {signup.route}`: create an unverified account and mail the link
//! - `GET {signup.route}/{token}`: confirm the email address
//! - `POST {signup.resendRoute}`: mail a fresh link to an unverified account

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use chrono::Utc;
use platform::password::ClearTextPassword;

use crate::application::config::Settings;
use crate::domain::adapter::SharedAdapter;
use crate::domain::email::Email;
use crate::domain::event::{AuthEvent, EventBus};
use crate::domain::feature::{FeatureKind, FeatureModule, Route};
use crate::domain::user::{Lookup, User, is_expired};
use crate::error::{AuthKitError, AuthKitResult};
use crate::features::dto::{EmailRequest, MessageResponse, SignupRequest};
use crate::features::{FeatureContext, expires_in, new_token, require, token_path};

pub struct SignupModule {
    ctx: FeatureContext,
}

impl SignupModule {
    pub fn new(settings: Arc<Settings>, adapter: SharedAdapter) -> Self {
        Self::from_context(FeatureContext::new(settings, adapter))
    }

    pub fn from_context(ctx: FeatureContext) -> Self {
        Self { ctx }
    }
}

impl FeatureModule for SignupModule {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Signup
    }

    fn routes(&self) -> Vec<Route> {
        let signup = &self.ctx.settings.signup;
        vec![
            Route::new(
                Method::POST,
                &signup.route,
                post(create_account).with_state(self.ctx.clone()),
            ),
            Route::new(
                Method::GET,
                token_path(&signup.route),
                get(confirm_email).with_state(self.ctx.clone()),
            ),
            Route::new(
                Method::POST,
                &signup.resend_route,
                post(resend_verification).with_state(self.ctx.clone()),
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

/// POST {signup.route}
async fn create_account(
    State(ctx): State<FeatureContext>,
    Json(req): Json<SignupRequest>,
) -> AuthKitResult<impl IntoResponse> {
    let name = req.name.trim().to_string();
    require("name", &name)?;
    let email = Email::new(req.email)?;
    let password = ClearTextPassword::new(req.password)?;

    if ctx.adapter.find(Lookup::Name, &name).await?.is_some() {
        return Err(AuthKitError::UserNameTaken);
    }
    if ctx.adapter.find(Lookup::Email, email.as_str()).await?.is_some() {
        return Err(AuthKitError::EmailTaken);
    }

    let hash = password.hash()?;
    let token = new_token();

    let mut user = User::new(name, email.into_inner(), hash.as_phc_string());
    user.signup_token = Some(token.clone());
    user.signup_token_expires = Some(expires_in(ctx.settings.signup.token_ttl()));

    let user = ctx.adapter.save(user).await?;

    let link = ctx.settings.link(&ctx.settings.signup.route, &token);
    ctx.send_mail(
        &user.email,
        "Confirm your email",
        format!("Welcome {}! Confirm your email address: {}", user.name, link),
    )
    .await?;

    tracing::info!(user = %user.name, "Account created");
    ctx.events.emit(AuthEvent::SignupPost(user.clone()));

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET {signup.route}/{token}
async fn confirm_email(
    State(ctx): State<FeatureContext>,
    Path(token): Path<String>,
) -> AuthKitResult<Json<User>> {
    let mut user = ctx
        .adapter
        .find(Lookup::SignupToken, &token)
        .await?
        .ok_or(AuthKitError::TokenInvalid)?;

    if is_expired(user.signup_token_expires, Utc::now()) {
        return Err(AuthKitError::TokenExpired);
    }

    user.email_verified = true;
    user.signup_token = None;
    user.signup_token_expires = None;
    ctx.adapter.update(&user).await?;

    tracing::info!(user = %user.name, "Email verified");
    ctx.events.emit(AuthEvent::SignupConfirm(user.clone()));

    Ok(Json(user))
}

/// POST {signup.resendRoute}
///
/// Always answers 200 so the response does not reveal which addresses exist.
async fn resend_verification(
    State(ctx): State<FeatureContext>,
    Json(req): Json<EmailRequest>,
) -> AuthKitResult<Json<MessageResponse>> {
    let email = Email::new(req.email)?;

    let pending = ctx
        .adapter
        .find(Lookup::Email, email.as_str())
        .await?
        .filter(|user| !user.email_verified);

    if let Some(mut user) = pending {
        let token = new_token();
        user.signup_token = Some(token.clone());
        user.signup_token_expires = Some(expires_in(ctx.settings.signup.token_ttl()));
        ctx.adapter.update(&user).await?;

        let link = ctx.settings.link(&ctx.settings.signup.route, &token);
        ctx.send_mail(
            &user.email,
            "Confirm your email",
            format!("Confirm your email address: {}", link),
        )
        .await?;

        tracing::debug!(user = %user.name, "Verification link resent");
    }

    Ok(Json(MessageResponse::new(
        "If the address belongs to an unverified account, a new link was sent",
    )))
}
