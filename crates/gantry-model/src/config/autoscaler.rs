use serde::{Deserialize, Serialize};

#[cfg(feature = "schema")]
use schemars::JsonSchema;

/// Autoscaled instance pool backing a runner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(default)]
pub struct AutoscalerConfig {
    /// Fleet plugin name resolved by the fleet factory.
    pub plugin: String,
    /// Opaque plugin settings, handed to the plugin unchanged.
    pub plugin_config: serde_json::Value,
    pub capacity_per_instance: u32,
    /// Instance is removed after this many jobs; 0 means unlimited.
    pub max_use_count: u32,
    pub max_instances: u32,
    pub delete_instances_on_shutdown: bool,
    pub policy: Vec<AutoscalerPolicy>,
    pub vm_isolation: VmIsolation,
    pub connector_config: ConnectorConfig,
}

impl Default for AutoscalerConfig {
    fn default() -> Self {
        Self {
            plugin: String::new(),
            plugin_config: serde_json::Value::Null,
            capacity_per_instance: 1,
            max_use_count: 0,
            max_instances: 0,
            delete_instances_on_shutdown: false,
            policy: Vec::new(),
            vm_isolation: VmIsolation::default(),
            connector_config: ConnectorConfig::default(),
        }
    }
}

/// Time-windowed scaling policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(default)]
pub struct AutoscalerPolicy {
    /// Cron-like expressions during which this policy is active.
    pub periods: Vec<String>,
    pub timezone: String,
    pub idle_count: u32,
    /// Seconds an idle instance is kept before removal.
    pub idle_time: Option<i64>,
    pub scale_factor: f64,
    pub scale_factor_limit: u32,
    /// Only idle capacity may be handed out; no on-demand provisioning.
    pub preemptive_mode: Option<bool>,
}

impl Default for AutoscalerPolicy {
    fn default() -> Self {
        Self {
            periods: vec!["* * * * *".to_string()],
            timezone: String::new(),
            idle_count: 0,
            idle_time: None,
            scale_factor: 0.0,
            scale_factor_limit: 0,
            preemptive_mode: None,
        }
    }
}

/// Nested VM isolation on top of fleet instances.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(default)]
pub struct VmIsolation {
    pub enabled: bool,
    /// Address of the nesting daemon on the instance.
    pub nesting_host: String,
    pub nesting_config: serde_json::Value,
    /// Image used when the job does not request one.
    pub image: Option<String>,
}

/// How the runner reaches an instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(default)]
pub struct ConnectorConfig {
    pub os: String,
    pub arch: String,
    pub protocol: String,
    pub protocol_port: Option<u16>,
    pub username: String,
    pub password: Option<String>,
    pub key_path: Option<String>,
    pub use_static_credentials: bool,
    pub use_external_addr: bool,
    /// Seconds.
    pub keepalive: Option<i64>,
    /// Seconds.
    pub timeout: Option<i64>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            os: "linux".to_string(),
            arch: "amd64".to_string(),
            protocol: "ssh".to_string(),
            protocol_port: None,
            username: String::new(),
            password: None,
            key_path: None,
            use_static_credentials: false,
            use_external_addr: false,
            keepalive: None,
            timeout: None,
        }
    }
}
