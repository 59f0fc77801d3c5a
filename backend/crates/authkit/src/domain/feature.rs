//! Feature module contract

use std::sync::Arc;

use axum::http::Method;
use axum::routing::MethodRouter;
use derive_more::Display;

use crate::application::config::Settings;
use crate::domain::adapter::SharedAdapter;
use crate::domain::event::EventBus;

/// The five identity workflows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum FeatureKind {
    #[display("signup")]
    Signup,
    #[display("login")]
    Login,
    #[display("forgot-password")]
    ForgotPassword,
    #[display("change-email")]
    ChangeEmail,
    #[display("delete-account")]
    DeleteAccount,
}

impl FeatureKind {
    /// Construction and mount order; earlier modules win route conflicts.
    pub const MOUNT_ORDER: [FeatureKind; 5] = [
        FeatureKind::Signup,
        FeatureKind::Login,
        FeatureKind::DeleteAccount,
        FeatureKind::ForgotPassword,
        FeatureKind::ChangeEmail,
    ];
}

/// One handler for one (method, path) pair, with its state already applied
pub struct Route {
    pub method: Method,
    pub path: String,
    pub handler: MethodRouter,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>, handler: MethodRouter) -> Self {
        Self {
            method,
            path: path.into(),
            handler,
        }
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// An independently behaving workflow unit.
///
/// Built from `(Arc<Settings>, SharedAdapter)`; exposes its sub-pipeline as
/// a list of routes and publishes lifecycle events on its own bus.
pub trait FeatureModule: Send + Sync {
    fn kind(&self) -> FeatureKind;

    /// Sub-pipeline, in registration order
    fn routes(&self) -> Vec<Route>;

    fn events(&self) -> &EventBus;

    fn adapter(&self) -> &SharedAdapter;

    fn settings(&self) -> &Arc<Settings>;
}
