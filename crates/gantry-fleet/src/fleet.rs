//! Contract of the external instance pool.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use gantry_model::ConnectorConfig;

use crate::FleetResult;

/// Free instance slots as reported by the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capacity {
    /// Slots on instances that are already running.
    pub available: i64,
    /// Slots the pool could still provide, including ones not provisioned yet.
    pub potential: i64,
}

/// Scaling behavior for a set of time windows.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub periods: Vec<String>,
    pub timezone: String,
    pub idle_count: u32,
    pub idle_time: Duration,
    pub scale_factor: f64,
    pub scale_factor_limit: u32,
    /// Only hand out slots on running instances.
    pub preemptive_mode: bool,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            periods: vec!["* * * * *".to_string()],
            timezone: String::new(),
            idle_count: 0,
            idle_time: Duration::ZERO,
            scale_factor: 0.0,
            scale_factor_limit: 0,
            preemptive_mode: false,
        }
    }
}

/// Pool settings derived from a runner's autoscaler section.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetSettings {
    pub plugin: String,
    pub plugin_config: serde_json::Value,
    pub capacity_per_instance: u32,
    pub max_use_count: u32,
    pub max_instances: u32,
    pub connector: ConnectorConfig,
}

/// How to reach an acquired instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectInfo {
    pub id: String,
    pub os: String,
    pub arch: String,
    pub protocol: String,
    pub protocol_port: Option<u16>,
    pub username: String,
    pub password: Option<String>,
    pub key_path: Option<String>,
    pub internal_addr: String,
    pub external_addr: String,
}

/// A slot on an instance, held under an acquisition key.
#[async_trait]
pub trait Acquisition: Send + Sync {
    async fn connect_info(&self) -> FleetResult<ConnectInfo>;

    fn instance_id(&self) -> &str;

    fn health_success(&self);

    fn health_failure(&self);

    /// Slot index on the instance, used to pick nested VM resources.
    fn slot(&self) -> u32;
}

/// Pool of instances scaled for one runner token.
#[async_trait]
pub trait Fleet: Send + Sync {
    /// Wait for a slot and hold it under `key`.
    async fn acquire(&self, key: &str, cancel: &CancellationToken) -> FleetResult<Arc<dyn Acquisition>>;

    /// Return the slot held under `key`. Unknown keys are ignored.
    async fn release(&self, key: &str);

    fn capacity(&self) -> Capacity;

    /// Schedule active right now.
    fn schedule(&self) -> Schedule;

    fn configure_schedule(&self, schedules: Vec<Schedule>) -> FleetResult<()>;

    async fn shutdown(&self, delete_instances: bool);
}

/// Builds a pool from plugin settings.
#[async_trait]
pub trait FleetFactory: Send + Sync {
    async fn create(&self, settings: FleetSettings) -> FleetResult<Arc<dyn Fleet>>;
}
