use std::collections::BTreeMap;

use serde::Deserialize;

use gantry_model::RunnerConfig;

/// Overrides a `config_exec` driver may print as JSON on stdout.
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub builds_dir: Option<String>,
    pub cache_dir: Option<String>,
    pub hostname: Option<String>,
    /// Extra variables for every later driver invocation.
    pub job_env: BTreeMap<String, String>,
}

impl DriverConfig {
    /// Parse driver output; blank output means no overrides.
    pub fn parse(output: &str) -> serde_json::Result<Self> {
        if output.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(output)
    }

    /// Runner config with the directory overrides applied.
    pub fn apply(&self, config: &RunnerConfig) -> RunnerConfig {
        let mut config = config.clone();
        if let Some(dir) = self.builds_dir.as_ref().filter(|d| !d.is_empty()) {
            config.builds_dir = Some(dir.clone());
        }
        if let Some(dir) = self.cache_dir.as_ref().filter(|d| !d.is_empty()) {
            config.cache_dir = Some(dir.clone());
        }
        config
    }
}
