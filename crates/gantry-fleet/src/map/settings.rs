use gantry_model::AutoscalerConfig;

use crate::{FleetError, FleetResult, FleetSettings};

pub fn to_fleet_settings(c: &AutoscalerConfig) -> FleetResult<FleetSettings> {
    if c.plugin.trim().is_empty() {
        return Err(FleetError::Config("autoscaler.plugin is not set".into()));
    }
    if c.max_instances == 0 {
        return Err(FleetError::Config("autoscaler.max_instances must be positive".into()));
    }
    Ok(FleetSettings {
        plugin: c.plugin.clone(),
        plugin_config: c.plugin_config.clone(),
        capacity_per_instance: c.capacity_per_instance.max(1),
        max_use_count: c.max_use_count,
        max_instances: c.max_instances,
        connector: c.connector_config.clone(),
    })
}
