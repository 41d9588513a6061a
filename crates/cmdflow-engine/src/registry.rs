//! Name-keyed registry of live engines
//!
//! A built engine registers itself under its name and leaves the registry
//! when it is closed. Registering a second engine under a taken name
//! replaces the first; closing the replaced engine leaves the newer entry
//! alone.

use crate::engine::Engine;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

static GLOBAL_REGISTRY: OnceLock<Arc<EngineRegistry>> = OnceLock::new();

#[derive(Debug, Default)]
pub struct EngineRegistry {
    engines: Mutex<HashMap<String, Arc<Engine>>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used unless a configuration names another
    pub fn global() -> Arc<EngineRegistry> {
        GLOBAL_REGISTRY.get_or_init(|| Arc::new(Self::new())).clone()
    }

    /// Register `engine` under its name, returning the engine it replaced
    pub fn register(&self, engine: Arc<Engine>) -> Option<Arc<Engine>> {
        let name = engine.name().to_string();
        let replaced = self.lock().insert(name, engine);
        if let Some(previous) = &replaced {
            tracing::debug!(engine = previous.name(), "registered engine replaced");
        }
        replaced
    }

    pub fn get(&self, name: &str) -> Option<Arc<Engine>> {
        self.lock().get(name).cloned()
    }

    /// Remove `engine` if it is the instance registered under its name
    pub fn unregister(&self, engine: &Engine) -> bool {
        let mut engines = self.lock();
        match engines.get(engine.name()) {
            Some(current) if std::ptr::eq(Arc::as_ptr(current), engine) => {
                engines.remove(engine.name());
                true
            }
            _ => false,
        }
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Engine>>> {
        self.engines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
