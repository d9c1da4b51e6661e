use serde::{Deserialize, Serialize};

#[cfg(feature = "schema")]
use schemars::JsonSchema;

use super::{AutoscalerConfig, CustomConfig, FeatureFlags, ProcessConfig};

/// One runner registration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(default)]
pub struct RunnerConfig {
    pub name: String,
    /// Runner token; identifies the capacity scaler for this registration.
    pub token: String,
    /// Executor provider name (`shell`, `custom`, `instance`, ...).
    pub executor: String,
    /// Shell name; empty selects the executor's default shell.
    pub shell: String,
    pub builds_dir: Option<String>,
    pub cache_dir: Option<String>,
    /// Base URL used instead of the job's repository URL.
    pub clone_url: Option<String>,
    /// Path of the helper binary that implements the cache and artifact
    /// subcommands inside the job environment.
    pub helper_command: Option<String>,
    /// Builds of different jobs share one environment (no global git config).
    pub shared: bool,
    pub pre_clone_script: Option<String>,
    pub pre_build_script: Option<String>,
    pub post_build_script: Option<String>,
    /// Extra `KEY=VALUE` pairs exported to every job.
    pub environment: Vec<String>,
    pub feature_flags: FeatureFlags,
    pub process: ProcessConfig,
    pub custom: Option<CustomConfig>,
    pub autoscaler: Option<AutoscalerConfig>,
}

impl RunnerConfig {
    /// Short form of the token, safe for logs.
    pub fn short_token(&self) -> &str {
        self.token.get(..8).unwrap_or(&self.token)
    }
}
