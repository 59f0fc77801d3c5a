//! Storage Adapter Resolver
//!
//! Turns settings (or a caller-supplied instance) into the one adapter every
//! feature module shares.

use std::sync::Arc;
use std::time::Duration;

use crate::application::config::Settings;
use crate::domain::adapter::SharedAdapter;
use crate::error::{AuthKitError, AuthKitResult};
use crate::infra::registry::BackendRegistry;

#[derive(Debug, Clone, Default)]
pub struct AdapterResolver {
    registry: BackendRegistry,
    timeout: Option<Duration>,
}

impl AdapterResolver {
    pub fn new(registry: BackendRegistry) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    /// Fail with `AdapterTimeout` when the constructor takes longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Resolve the shared adapter.
    ///
    /// A supplied instance is returned without awaiting anything. Otherwise
    /// the backend constructor for the descriptor runs exactly once.
    pub async fn resolve(
        &self,
        supplied: Option<SharedAdapter>,
        settings: &Arc<Settings>,
    ) -> AuthKitResult<SharedAdapter> {
        if let Some(adapter) = supplied {
            tracing::debug!(backend = adapter.backend(), "Using supplied storage adapter");
            return Ok(adapter);
        }

        let db = settings
            .db
            .as_ref()
            .ok_or_else(|| AuthKitError::InvalidConfig("missing db descriptor".to_string()))?;

        let backend = db.backend_id();
        let constructor = self
            .registry
            .get(&backend)
            .ok_or_else(|| AuthKitError::UnknownBackend(backend.clone()))?;

        tracing::debug!(backend = %backend, "Constructing storage adapter");
        let pending = constructor(Arc::clone(settings));

        let adapter = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| AuthKitError::AdapterTimeout(limit))??,
            None => pending.await?,
        };

        tracing::info!(backend = %backend, "Storage adapter ready");
        Ok(adapter)
    }
}
