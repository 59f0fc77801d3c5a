//! Delete Account

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{Method, header};
use axum::response::IntoResponse;
use axum::routing::post;
use platform::password::{ClearTextPassword, HashedPassword};

use crate::application::config::Settings;
use crate::domain::adapter::SharedAdapter;
use crate::domain::event::{AuthEvent, EventBus};
use crate::domain::feature::{FeatureKind, FeatureModule, Route};
use crate::domain::user::Lookup;
use crate::error::{AuthKitError, AuthKitResult};
use crate::features::FeatureContext;
use crate::features::dto::{DeleteAccountRequest, MessageResponse};
use crate::features::session::CurrentUser;

pub struct DeleteAccountModule {
    ctx: FeatureContext,
}

impl DeleteAccountModule {
    pub fn new(settings: Arc<Settings>, adapter: SharedAdapter) -> Self {
        Self::from_context(FeatureContext::new(settings, adapter))
    }

    pub fn from_context(ctx: FeatureContext) -> Self {
        Self { ctx }
    }
}

impl FeatureModule for DeleteAccountModule {
    fn kind(&self) -> FeatureKind {
        FeatureKind::DeleteAccount
    }

    fn routes(&self) -> Vec<Route> {
        vec![Route::new(
            Method::POST,
            &self.ctx.settings.delete_account.route,
            post(delete_account).with_state(self.ctx.clone()),
        )]
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

/// POST {deleteAccount.route}
async fn delete_account(
    State(ctx): State<FeatureContext>,
    CurrentUser(session): CurrentUser,
    Json(req): Json<DeleteAccountRequest>,
) -> AuthKitResult<impl IntoResponse> {
    if req.name != session.user.name {
        return Err(AuthKitError::BadRequest(
            "Name does not match the signed-in user".to_string(),
        ));
    }
    if req.phrase != ctx.settings.delete_account.phrase {
        return Err(AuthKitError::BadRequest(
            "Confirmation phrase does not match".to_string(),
        ));
    }

    let user = ctx
        .adapter
        .find(Lookup::Name, &session.user.name)
        .await?
        .ok_or(AuthKitError::UserNotFound)?;

    let candidate = ClearTextPassword::for_verification(req.password);
    if !HashedPassword::from_phc_string(user.password_hash.as_str())?.verify(&candidate) {
        return Err(AuthKitError::InvalidCredentials);
    }

    ctx.adapter.remove(&user.name).await?;
    let closed = ctx.sessions.destroy_user(&user.name).await;

    tracing::info!(user = %user.name, sessions_closed = closed, "Account deleted");
    ctx.events.emit(AuthEvent::Delete(user));

    let cookie = ctx.settings.session.cookie().delete_header();
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(MessageResponse::new("Account deleted")),
    ))
}
