//! Composition Orchestrator
//!
//! Drives one composition from raw configuration to a mountable router:
//!
//! ```text
//! Idle -> MergingConfig -> ResolvingAdapter -> ConstructingModules
//!      -> MergingPipeline -> Ready
//! ```
//!
//! Configuration and adapter failures end in `Failed` and are returned from
//! [`AuthKitBuilder::build`]; no module is constructed in that case.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use derive_more::Display;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::application::config::{self, Settings};
use crate::application::resolver::AdapterResolver;
use crate::domain::adapter::SharedAdapter;
use crate::domain::event::{AuthEvent, DEFAULT_EVENT_CAPACITY, EventBus};
use crate::domain::feature::{FeatureKind, FeatureModule};
use crate::domain::mail::SharedMailer;
use crate::domain::user::User;
use crate::domain::view::ViewEngine;
use crate::error::{AuthKitError, AuthKitResult};
use crate::features::{FeatureContext, SessionRegistry, build_module};
use crate::infra::registry::BackendRegistry;
use crate::infra::stub_mail::StubTransport;
use crate::presentation::fallback::{self, EntryDocument};
use crate::presentation::middleware::{SessionState, enrich_view_context, resolve_session};
use crate::presentation::pipeline::{Pipeline, RouteEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ComposeState {
    #[display("idle")]
    Idle,
    #[display("merging-config")]
    MergingConfig,
    #[display("resolving-adapter")]
    ResolvingAdapter,
    #[display("constructing-modules")]
    ConstructingModules,
    #[display("merging-pipeline")]
    MergingPipeline,
    #[display("ready")]
    Ready,
    #[display("failed")]
    Failed,
}

fn advance(state: &mut ComposeState, next: ComposeState) {
    tracing::debug!(from = %state, to = %next, "Composition state");
    *state = next;
}

// ============================================================================
// Builder
// ============================================================================

pub struct AuthKitBuilder {
    config: Value,
    adapter: Option<SharedAdapter>,
    registry: BackendRegistry,
    adapter_timeout: Option<Duration>,
    mailer: Option<SharedMailer>,
    entry: EntryDocument,
    event_capacity: usize,
}

impl AuthKitBuilder {
    pub fn new(config: Value) -> Self {
        Self {
            config,
            adapter: None,
            registry: BackendRegistry::default(),
            adapter_timeout: None,
            mailer: None,
            entry: EntryDocument::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Use an existing adapter; no backend constructor runs
    pub fn with_adapter(mut self, adapter: SharedAdapter) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Register an additional backend constructor
    pub fn with_backend<F>(mut self, id: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(Arc<Settings>) -> BoxFuture<'static, AuthKitResult<SharedAdapter>>
            + Send
            + Sync
            + 'static,
    {
        self.registry.register(id, constructor);
        self
    }

    /// Replace the whole backend registry
    pub fn with_registry(mut self, registry: BackendRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = Some(timeout);
        self
    }

    pub fn with_mail_transport(mut self, mailer: SharedMailer) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Renderer used when `rest.useViewEngine` is true
    pub fn with_view_engine(
        mut self,
        engine: Arc<dyn ViewEngine>,
        views_root: impl Into<PathBuf>,
    ) -> Self {
        self.entry.engine = Some(engine);
        self.entry.views_root = views_root.into();
        self
    }

    /// Directory holding the static entry document
    pub fn with_app_dir(mut self, app_dir: impl Into<PathBuf>) -> Self {
        self.entry.app_dir = app_dir.into();
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub async fn build(self) -> AuthKitResult<AuthKit> {
        let mut state = ComposeState::Idle;

        advance(&mut state, ComposeState::MergingConfig);
        let settings = match self.settings() {
            Ok(settings) => Arc::new(settings),
            Err(e) => return Err(fail(&mut state, e)),
        };

        advance(&mut state, ComposeState::ResolvingAdapter);
        let mut resolver = AdapterResolver::new(self.registry);
        if let Some(timeout) = self.adapter_timeout {
            resolver = resolver.with_timeout(timeout);
        }
        let adapter = match resolver.resolve(self.adapter, &settings).await {
            Ok(adapter) => adapter,
            Err(e) => return Err(fail(&mut state, e)),
        };

        advance(&mut state, ComposeState::ConstructingModules);
        let mailer = self.mailer.unwrap_or_else(|| Arc::new(StubTransport));
        let sessions = SessionRegistry::default();
        let modules: Vec<Arc<dyn FeatureModule>> = FeatureKind::MOUNT_ORDER
            .into_iter()
            .map(|kind| {
                let ctx = FeatureContext::new(settings.clone(), adapter.clone())
                    .with_mailer(mailer.clone())
                    .with_sessions(sessions.clone())
                    .with_event_capacity(self.event_capacity);
                build_module(kind, ctx)
            })
            .collect();

        advance(&mut state, ComposeState::MergingPipeline);
        let events = EventBus::new(self.event_capacity);
        let announce = settings.uses_ephemeral_store().then(|| settings.clone());
        for module in &modules {
            pipe(module.kind(), module.events().subscribe(), events.clone(), announce.clone());
        }

        let mut pipeline = Pipeline::new();
        for module in &modules {
            pipeline.mount_module(module.as_ref());
        }
        let pipeline = fallback::register(&settings, pipeline, self.entry);
        let (router, route_table) = pipeline.into_parts();

        let session_state = SessionState {
            settings: settings.clone(),
            adapter: adapter.clone(),
            sessions: sessions.clone(),
        };
        let router = router
            .layer(from_fn(enrich_view_context))
            .layer(from_fn_with_state(session_state, resolve_session));

        advance(&mut state, ComposeState::Ready);
        tracing::info!(
            app = %settings.appname,
            backend = adapter.backend(),
            mail = mailer.kind(),
            routes = route_table.len(),
            "AuthKit ready"
        );

        Ok(AuthKit {
            settings,
            adapter,
            modules,
            events,
            sessions,
            router,
            route_table,
            state,
        })
    }

    /// MergingConfig: defaults, fallbacks, typed settings
    fn settings(&self) -> AuthKitResult<Settings> {
        let mut merged = config::merge(&self.config);
        config::ensure_mail(&mut merged);
        if self.adapter.is_none() {
            config::ensure_database(&mut merged);
        }
        Settings::from_value(merged)
    }
}

fn fail(state: &mut ComposeState, error: AuthKitError) -> AuthKitError {
    tracing::error!(stage = %state, error = %error, "Composition failed");
    advance(state, ComposeState::Failed);
    error
}

/// Forward one module's events onto the unified bus, in order.
///
/// With `announce` set, a signup on the ephemeral store also logs the
/// confirmation link, since no mail leaves the process.
fn pipe(
    kind: FeatureKind,
    mut source: broadcast::Receiver<AuthEvent>,
    sink: EventBus,
    announce: Option<Arc<Settings>>,
) {
    tokio::spawn(async move {
        loop {
            match source.recv().await {
                Ok(event) => {
                    if let (Some(settings), AuthEvent::SignupPost(user)) = (&announce, &event) {
                        if let Some(link) = quickstart_link(settings, user) {
                            tracing::info!("{}", link);
                        }
                    }
                    sink.emit(event);
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(module = %kind, missed, "Event forwarder lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::trace!(module = %kind, "Event forwarder stopped");
    });
}

/// `{url}{signup.route}/{token}` for a freshly signed-up user.
///
/// Routes are relative to the router, so a nested mount only shows up here
/// when `url` carries its prefix.
pub fn quickstart_link(settings: &Settings, user: &User) -> Option<String> {
    user.signup_token
        .as_deref()
        .map(|token| settings.link(&settings.signup.route, token))
}

// ============================================================================
// Composition
// ============================================================================

/// A ready composition. Each `build()` yields an independent instance.
pub struct AuthKit {
    settings: Arc<Settings>,
    adapter: SharedAdapter,
    modules: Vec<Arc<dyn FeatureModule>>,
    events: EventBus,
    sessions: SessionRegistry,
    router: Router,
    route_table: Vec<RouteEntry>,
    state: ComposeState,
}

impl AuthKit {
    pub fn builder(config: Value) -> AuthKitBuilder {
        AuthKitBuilder::new(config)
    }

    /// Unified pipeline, mountable with `Router::nest`
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn adapter(&self) -> &SharedAdapter {
        &self.adapter
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Modules in mount order
    pub fn modules(&self) -> &[Arc<dyn FeatureModule>] {
        &self.modules
    }

    pub fn module(&self, kind: FeatureKind) -> Option<&Arc<dyn FeatureModule>> {
        self.modules.iter().find(|module| module.kind() == kind)
    }

    pub fn route_table(&self) -> &[RouteEntry] {
        &self.route_table
    }

    pub fn state(&self) -> ComposeState {
        self.state
    }
}

impl std::fmt::Debug for AuthKit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthKit")
            .field("appname", &self.settings.appname)
            .field("backend", &self.adapter.backend())
            .field("routes", &self.route_table.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
