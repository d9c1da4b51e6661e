//! Capacity provider backed by an autoscaled instance pool.
mod scalers;
pub(crate) use scalers::Scalers;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, instrument};

use gantry_core::{AcquisitionRef, Executor, ExecutorData, ExecutorProvider, ProviderError};
use gantry_model::RunnerConfig;

use crate::{Connector, Fleet, FleetFactory, InstanceExecutor, NestingConnector};

/// Upper bound on waiting for a fleet slot during prepare.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub struct AutoscalerProvider {
    name: String,
    scalers: Arc<Scalers>,
    connector: Arc<dyn Connector>,
    nesting: Option<Arc<dyn NestingConnector>>,
    acquire_timeout: Duration,
}

impl AutoscalerProvider {
    pub fn new(
        name: impl Into<String>,
        factory: Arc<dyn FleetFactory>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            name: name.into(),
            scalers: Arc::new(Scalers::new(factory)),
            connector,
            nesting: None,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }

    pub fn with_nesting(mut self, nesting: Arc<dyn NestingConnector>) -> Self {
        self.nesting = Some(nesting);
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Shut every fleet down, deleting instances where configured.
    pub async fn shutdown(&self) {
        self.scalers.shutdown().await;
    }
}

#[async_trait]
impl ExecutorProvider for AutoscalerProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(level = "debug", skip_all, fields(runner = config.short_token()))]
    async fn acquire(&self, config: &RunnerConfig) -> Result<Option<ExecutorData>, ProviderError> {
        let (scaler, fresh) = self.scalers.init(config).await?;
        admit(scaler.fleet.as_ref())?;
        debug!(fresh, "capacity reserved");
        Ok(Some(ExecutorData::Acquisition(AcquisitionRef::new(
            config.token.clone(),
        ))))
    }

    async fn release(&self, _config: &RunnerConfig, data: ExecutorData) {
        match data {
            ExecutorData::Acquisition(reservation) => self.scalers.release(reservation).await,
        }
    }

    fn create(&self) -> Box<dyn Executor> {
        Box::new(InstanceExecutor::new(
            Arc::clone(&self.scalers),
            Arc::clone(&self.connector),
            self.nesting.clone(),
            self.acquire_timeout,
        ))
    }
}

fn admit(fleet: &dyn Fleet) -> Result<(), ProviderError> {
    let capacity = fleet.capacity();
    let schedule = fleet.schedule();
    debug!(
        available = capacity.available,
        potential = capacity.potential,
        preemptive = schedule.preemptive_mode,
        "checking capacity"
    );
    if capacity.available > 0 && capacity.potential > 0 {
        return Ok(());
    }
    let mut reason = format!(
        "available {}, potential {}",
        capacity.available, capacity.potential
    );
    if schedule.preemptive_mode && capacity.available <= 0 {
        reason.push_str("; no idle instance and allow on demand is disabled");
    }
    Err(ProviderError::Capacity(reason))
}
