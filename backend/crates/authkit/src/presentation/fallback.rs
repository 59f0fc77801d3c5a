//! Fallback Router
//!
//! Serves the single-page entry document on every configured workflow path
//! that no feature module answers with GET.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use axum::http::Method;
use axum::response::Html;
use axum::routing::{MethodRouter, get, get_service};
use serde_json::json;
use tower_http::services::ServeFile;

use crate::application::config::Settings;
use crate::domain::feature::Route;
use crate::domain::view::ViewEngine;
use crate::error::{AuthKitError, AuthKitResult};
use crate::features::token_path;
use crate::presentation::middleware::ViewContext;
use crate::presentation::pipeline::{Pipeline, RouteOrigin};

/// Where the entry document comes from
#[derive(Clone, Default)]
pub struct EntryDocument {
    /// Directory holding the static index file
    pub app_dir: PathBuf,
    /// Template root handed to the view engine as `basedir`
    pub views_root: PathBuf,
    pub engine: Option<Arc<dyn ViewEngine>>,
}

impl std::fmt::Debug for EntryDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryDocument")
            .field("app_dir", &self.app_dir)
            .field("views_root", &self.views_root)
            .field("engine", &self.engine.is_some())
            .finish()
    }
}

/// Workflow paths that fall back to the entry document, without duplicates
pub fn fallback_paths(settings: &Settings) -> Vec<String> {
    let mut paths = vec![
        settings.signup.route.clone(),
        settings.signup.resend_route.clone(),
        token_path(&settings.signup.resend_route),
        settings.login.route.clone(),
        settings.login.logout_route.clone(),
    ];
    if let Some(two_factor) = &settings.login.two_factor_route {
        paths.push(two_factor.clone());
    }
    paths.extend([
        settings.forgot_password.route.clone(),
        token_path(&settings.forgot_password.route),
        settings.change_email.route.clone(),
        token_path(&settings.change_email.route),
        settings.delete_account.route.clone(),
    ]);

    let mut unique = Vec::with_capacity(paths.len());
    for path in paths {
        if !unique.contains(&path) {
            unique.push(path);
        }
    }
    unique
}

/// Append the fallback routes when `rest` is configured.
///
/// Must run after every feature module is mounted.
pub fn register(settings: &Arc<Settings>, mut pipeline: Pipeline, entry: EntryDocument) -> Pipeline {
    let Some(rest) = &settings.rest else {
        return pipeline;
    };

    let handler: MethodRouter = if rest.use_view_engine {
        get(render_entry).with_state(RenderState {
            engine: entry.engine,
            index: rest.index.clone(),
            views_root: entry.views_root,
        })
    } else {
        get_service(ServeFile::new(entry.app_dir.join(&rest.index)))
    };

    let mut mounted = 0;
    for path in fallback_paths(settings) {
        if pipeline.mount(
            RouteOrigin::Fallback,
            Route::new(Method::GET, path, handler.clone()),
        ) {
            mounted += 1;
        }
    }

    tracing::debug!(
        routes = mounted,
        view_engine = rest.use_view_engine,
        index = %rest.index,
        "Fallback routes registered"
    );
    pipeline
}

#[derive(Clone)]
struct RenderState {
    engine: Option<Arc<dyn ViewEngine>>,
    index: String,
    views_root: PathBuf,
}

async fn render_entry(
    State(state): State<RenderState>,
    view: Option<Extension<ViewContext>>,
) -> AuthKitResult<Html<String>> {
    let engine = state
        .engine
        .as_ref()
        .ok_or_else(|| AuthKitError::Internal("no view engine configured".to_string()))?;

    let view = view.map(|Extension(view)| view).unwrap_or_default();
    let context = json!({
        "basedir": state.views_root.display().to_string(),
        "name": view.name,
        "email": view.email,
    });

    engine.render(&state.index, &context).map(Html)
}
