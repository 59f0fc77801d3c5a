//! Login / Logout

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{Method, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use chrono::Utc;
use platform::password::{ClearTextPassword, HashedPassword};

use crate::application::config::Settings;
use crate::domain::adapter::SharedAdapter;
use crate::domain::event::{AuthEvent, EventBus};
use crate::domain::feature::{FeatureKind, FeatureModule, Route};
use crate::domain::user::{Lookup, User};
use crate::error::{AuthKitError, AuthKitResult};
use crate::features::dto::{LoginRequest, MessageResponse};
use crate::features::session::CurrentUser;
use crate::features::{FeatureContext, require};

pub struct LoginModule {
    ctx: FeatureContext,
}

impl LoginModule {
    pub fn new(settings: Arc<Settings>, adapter: SharedAdapter) -> Self {
        Self::from_context(FeatureContext::new(settings, adapter))
    }

    pub fn from_context(ctx: FeatureContext) -> Self {
        Self { ctx }
    }
}

impl FeatureModule for LoginModule {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Login
    }

    fn routes(&self) -> Vec<Route> {
        let login = &self.ctx.settings.login;
        vec![
            Route::new(
                Method::POST,
                &login.route,
                post(sign_in).with_state(self.ctx.clone()),
            ),
            Route::new(
                Method::POST,
                &login.logout_route,
                post(sign_out).with_state(self.ctx.clone()),
            ),
            Route::new(
                Method::GET,
                &login.logout_route,
                get(sign_out).with_state(self.ctx.clone()),
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

/// POST {login.route}
async fn sign_in(
    State(ctx): State<FeatureContext>,
    Json(req): Json<LoginRequest>,
) -> AuthKitResult<impl IntoResponse> {
    require("login", &req.login)?;
    let login = req.login.trim();

    // Looks like email
    let user = if login.contains('@') {
        ctx.adapter
            .find(Lookup::Email, &login.to_lowercase())
            .await?
    } else {
        ctx.adapter.find(Lookup::Name, login).await?
    };
    let mut user = user.ok_or(AuthKitError::InvalidCredentials)?;

    let now = Utc::now();
    if user.is_locked(now) {
        return Err(AuthKitError::AccountLocked);
    }

    let candidate = ClearTextPassword::for_verification(req.password);
    let stored = HashedPassword::from_phc_string(user.password_hash.as_str())?;

    if !stored.verify(&candidate) {
        return Err(record_failure(&ctx, &mut user).await?);
    }

    if !user.email_verified {
        return Err(AuthKitError::EmailNotVerified);
    }

    if user.failed_login_attempts > 0 || user.account_locked_until.is_some() {
        user.failed_login_attempts = 0;
        user.account_locked_until = None;
        ctx.adapter.update(&user).await?;
    }

    let token = ctx.sessions.create(&user.name).await;
    let cookie = ctx.settings.session.cookie().set_header(&token);

    tracing::info!(user = %user.name, "Signed in");
    ctx.events.emit(AuthEvent::Login(user.clone()));

    Ok(([(header::SET_COOKIE, cookie)], Json(user)))
}

/// Count a failed attempt and lock the account once the limit is reached.
/// Returns the error to answer with.
async fn record_failure(ctx: &FeatureContext, user: &mut User) -> AuthKitResult<AuthKitError> {
    let limit = ctx.settings.login.failed_login_attempts;
    user.failed_login_attempts += 1;

    let locked = limit > 0 && user.failed_login_attempts >= limit;
    if locked {
        user.account_locked_until = Some(Utc::now() + ctx.settings.login.lock_duration());
        user.failed_login_attempts = 0;
        tracing::warn!(user = %user.name, "Account locked after repeated failures");
    }

    ctx.adapter.update(user).await?;

    Ok(if locked {
        AuthKitError::AccountLocked
    } else {
        AuthKitError::InvalidCredentials
    })
}

/// POST|GET {login.logoutRoute}
async fn sign_out(
    State(ctx): State<FeatureContext>,
    current: Option<CurrentUser>,
) -> impl IntoResponse {
    if let Some(CurrentUser(session)) = current {
        if let Some(token) = &session.token {
            ctx.sessions.destroy(token).await;
        }
        tracing::info!(user = %session.user.name, "Signed out");
        ctx.events.emit(AuthEvent::Logout(session.user));
    }

    let cookie = ctx.settings.session.cookie().delete_header();
    (
        [(header::SET_COOKIE, cookie)],
        Json(MessageResponse::new("Signed out")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::merge;
    use crate::infra::memory::MemoryStore;

    #[test]
    fn test_logout_accepts_get_and_post() {
        let settings = Arc::new(
            Settings::from_value(merge(&serde_json::json!({ "login": { "logoutRoute": "/bye" } })))
                .unwrap(),
        );
        let module = LoginModule::new(settings, Arc::new(MemoryStore::new("users")));

        let logout: Vec<_> = module
            .routes()
            .into_iter()
            .filter(|r| r.path == "/bye")
            .map(|r| r.method)
            .collect();

        assert_eq!(logout, vec![Method::POST, Method::GET]);
    }
}
