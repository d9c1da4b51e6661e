//! Executor providers by name.
//!
//! Built once at startup and passed by reference to whatever runs jobs.
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::{ExecutorError, ExecutorProvider, ExecutorResult};

#[derive(Default)]
pub struct ExecutorRegistry {
    providers: Vec<Arc<dyn ExecutorProvider>>,
}

impl ExecutorRegistry {
    #[inline]
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Register `provider`; a later registration under the same name wins.
    pub fn register(&mut self, provider: Arc<dyn ExecutorProvider>) {
        debug!(executor = provider.name(), "executor provider registered");
        self.providers.retain(|p| p.name() != provider.name());
        self.providers.push(provider);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ExecutorProvider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    /// Provider selected by the runner's `executor` field.
    #[instrument(level = "debug", skip(self))]
    pub fn resolve(&self, name: &str) -> ExecutorResult<Arc<dyn ExecutorProvider>> {
        self.get(name)
            .cloned()
            .ok_or_else(|| ExecutorError::UnknownExecutor(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|p| p.name())
    }
}
