//! Backend Registry
//!
//! Maps backend identifiers to adapter constructors. Hosts register their own
//! backends next to the built-in in-memory one.

use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::application::config::Settings;
use crate::domain::adapter::SharedAdapter;
use crate::error::AuthKitResult;
use crate::infra::memory::{MEMORY_BACKEND, MemoryStore};

/// Asynchronous adapter constructor
pub type BackendConstructor =
    Arc<dyn Fn(Arc<Settings>) -> BoxFuture<'static, AuthKitResult<SharedAdapter>> + Send + Sync>;

#[derive(Clone)]
pub struct BackendRegistry {
    constructors: HashMap<String, BackendConstructor>,
}

impl BackendRegistry {
    /// Registry without any backend
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with the in-memory backend
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(MEMORY_BACKEND, |settings| {
            MemoryStore::connect(settings).boxed()
        });
        registry
    }

    /// Register (or replace) the constructor for `id`
    pub fn register<F>(&mut self, id: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(Arc<Settings>) -> BoxFuture<'static, AuthKitResult<SharedAdapter>>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(id.into(), Arc::new(constructor));
        self
    }

    pub fn get(&self, id: &str) -> Option<BackendConstructor> {
        self.constructors.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.constructors.contains_key(id)
    }

    pub fn backends(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.backends().collect();
        ids.sort_unstable();
        f.debug_struct("BackendRegistry")
            .field("backends", &ids)
            .finish()
    }
}
