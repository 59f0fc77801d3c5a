//! Context enrichment middleware
//!
//! Applied to the whole pipeline: `resolve_session` runs first, then
//! `enrich_view_context`.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use platform::cookie::extract_cookie;

use crate::application::config::Settings;
use crate::domain::adapter::SharedAdapter;
use crate::domain::user::Lookup;
use crate::features::session::{SessionRegistry, SessionUser};

/// Middleware state
#[derive(Clone)]
pub struct SessionState {
    pub settings: Arc<Settings>,
    pub adapter: SharedAdapter,
    pub sessions: SessionRegistry,
}

/// Values exposed to rendered views
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewContext {
    pub name: String,
    pub email: String,
}

/// Attach the session user, if any, to the request extensions.
///
/// A `SessionUser` already present (inserted by the host) is kept.
pub async fn resolve_session(
    State(state): State<SessionState>,
    mut req: Request,
    next: Next,
) -> Response {
    if req.extensions().get::<SessionUser>().is_some() {
        return next.run(req).await;
    }

    let token = extract_cookie(req.headers(), &state.settings.session.cookie_name);

    if let Some(token) = token {
        if let Some(name) = state.sessions.lookup(&token).await {
            match state.adapter.find(Lookup::Name, &name).await {
                Ok(Some(user)) => {
                    req.extensions_mut().insert(SessionUser {
                        user,
                        token: Some(token),
                    });
                }
                Ok(None) => {
                    // User vanished since sign-in
                    state.sessions.destroy(&token).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Session user lookup failed");
                }
            }
        }
    }

    next.run(req).await
}

/// Insert a [`ViewContext`]; empty strings when nobody is signed in.
pub async fn enrich_view_context(mut req: Request, next: Next) -> Response {
    let context = req
        .extensions()
        .get::<SessionUser>()
        .map(|session| ViewContext {
            name: session.user.name.clone(),
            email: session.user.email.clone(),
        })
        .unwrap_or_default();

    req.extensions_mut().insert(context);
    next.run(req).await
}
