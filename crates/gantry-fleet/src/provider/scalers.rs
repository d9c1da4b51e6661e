use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use gantry_core::{AcquisitionRef, ProviderError};
use gantry_model::RunnerConfig;

use crate::{
    Fleet, FleetFactory,
    map::{to_fleet_settings, to_schedules},
};

#[derive(Clone)]
pub(crate) struct Scaler {
    pub(crate) fleet: Arc<dyn Fleet>,
    delete_on_shutdown: bool,
}

/// Fleet scalers by runner token.
///
/// The lock covers both lookup and construction, so concurrent first jobs
/// of a runner share one scaler.
pub(crate) struct Scalers {
    factory: Arc<dyn FleetFactory>,
    entries: Mutex<HashMap<String, Scaler>>,
}

impl Scalers {
    pub(crate) fn new(factory: Arc<dyn FleetFactory>) -> Self {
        Self {
            factory,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Scaler for `config.token`, building it on first use.
    ///
    /// The flag is true for the caller that built it. A new scaler gets its
    /// schedule before it becomes visible to anyone else.
    pub(crate) async fn init(&self, config: &RunnerConfig) -> Result<(Scaler, bool), ProviderError> {
        let mut entries = self.entries.lock().await;
        if let Some(scaler) = entries.get(&config.token) {
            return Ok((scaler.clone(), false));
        }

        let autoscaler = config
            .autoscaler
            .as_ref()
            .ok_or_else(|| ProviderError::NotConfigured(config.short_token().to_string()))?;
        let settings = to_fleet_settings(autoscaler)?;
        let fleet = self.factory.create(settings).await?;
        fleet.configure_schedule(to_schedules(&autoscaler.policy))?;

        info!(
            runner = config.short_token(),
            plugin = %autoscaler.plugin,
            max_instances = autoscaler.max_instances,
            "fleet scaler created"
        );
        let scaler = Scaler {
            fleet,
            delete_on_shutdown: autoscaler.delete_instances_on_shutdown,
        };
        entries.insert(config.token.clone(), scaler.clone());
        Ok((scaler, true))
    }

    pub(crate) async fn fleet(&self, token: &str) -> Option<Arc<dyn Fleet>> {
        self.entries.lock().await.get(token).map(|s| Arc::clone(&s.fleet))
    }

    /// Give a reservation back to its fleet.
    ///
    /// Unbound reservations hold nothing; unknown tokens are ignored.
    pub(crate) async fn release(&self, reservation: AcquisitionRef) {
        let Some(key) = reservation.key() else {
            debug!("reservation was never bound to an instance");
            return;
        };
        match self.fleet(reservation.token()).await {
            Some(fleet) => {
                debug!(key, "releasing instance slot");
                fleet.release(key).await;
            }
            None => warn!(key, "no fleet for released reservation"),
        }
    }

    pub(crate) async fn shutdown(&self) {
        let scalers: Vec<Scaler> = self.entries.lock().await.drain().map(|(_, s)| s).collect();
        for scaler in scalers {
            scaler.fleet.shutdown(scaler.delete_on_shutdown).await;
        }
    }
}
