use async_trait::async_trait;

use gantry_model::RunnerConfig;

use crate::{Executor, ExecutorData, ProviderError};

/// Factory for one kind of executor, with optional capacity management.
#[async_trait]
pub trait ExecutorProvider: Send + Sync {
    /// Name runners select this provider by (`RunnerConfig::executor`).
    fn name(&self) -> &str;

    /// Reserve capacity for one job.
    ///
    /// Providers without capacity management return `Ok(None)`.
    async fn acquire(&self, _config: &RunnerConfig) -> Result<Option<ExecutorData>, ProviderError> {
        Ok(None)
    }

    /// Give back a reservation. Handles this provider did not issue are ignored.
    async fn release(&self, _config: &RunnerConfig, _data: ExecutorData) {}

    fn create(&self) -> Box<dyn Executor>;
}
