//! Unified Pipeline
//!
//! Accumulates routes into one `Router`. The first claimant of a
//! `(method, path)` pair keeps it; later claimants are skipped.

use std::collections::HashMap;
use std::fmt;

use axum::Router;
use axum::http::Method;

use crate::domain::feature::{FeatureKind, FeatureModule, Route};

/// Who registered a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteOrigin {
    Feature(FeatureKind),
    Fallback,
}

impl fmt::Display for RouteOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteOrigin::Feature(kind) => write!(f, "{}", kind),
            RouteOrigin::Fallback => f.write_str("fallback"),
        }
    }
}

/// One registered `(method, path)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub method: Method,
    pub path: String,
    pub origin: RouteOrigin,
}

pub struct Pipeline {
    router: Router,
    claimed: HashMap<(Method, String), RouteOrigin>,
    table: Vec<RouteEntry>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            claimed: HashMap::new(),
            table: Vec::new(),
        }
    }

    /// Register `route` unless its pair is already claimed.
    /// Returns whether it was registered.
    pub fn mount(&mut self, origin: RouteOrigin, route: Route) -> bool {
        let Route {
            method,
            path,
            handler,
        } = route;

        if let Some(owner) = self.claimant(&method, &path) {
            tracing::warn!(
                method = %method,
                path = %path,
                owner = %owner,
                skipped = %origin,
                "Route already claimed, skipping"
            );
            return false;
        }

        self.router = std::mem::take(&mut self.router).route(&path, handler);
        self.claimed.insert((method.clone(), path.clone()), origin);
        self.table.push(RouteEntry {
            method,
            path,
            origin,
        });
        true
    }

    /// Mount every route of `module`; returns how many were registered
    pub fn mount_module(&mut self, module: &dyn FeatureModule) -> usize {
        let origin = RouteOrigin::Feature(module.kind());
        let mounted = module
            .routes()
            .into_iter()
            .map(|route| self.mount(origin, route))
            .filter(|registered| *registered)
            .count();

        tracing::debug!(module = %module.kind(), routes = mounted, "Module mounted");
        mounted
    }

    pub fn is_claimed(&self, method: &Method, path: &str) -> bool {
        self.claimant(method, path).is_some()
    }

    pub fn claimant(&self, method: &Method, path: &str) -> Option<RouteOrigin> {
        self.claimed
            .get(&(method.clone(), path.to_string()))
            .copied()
    }

    /// Registered routes, in registration order
    pub fn route_table(&self) -> &[RouteEntry] {
        &self.table
    }

    pub fn into_parts(self) -> (Router, Vec<RouteEntry>) {
        (self.router, self.table)
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("routes", &self.table)
            .finish_non_exhaustive()
    }
}
