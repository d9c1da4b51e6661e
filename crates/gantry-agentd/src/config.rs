use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use gantry_model::{Job, RunnerConfig};
use gantry_observe::LoggerConfig;

/// Contents of the agent configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Subscriber setup; defaults to text output in UTC.
    pub logger: LoggerConfig,
    /// The single runner registration this process serves.
    pub runner: RunnerConfig,
}

impl AgentConfig {
    /// Read and parse the agent file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

/// Read and parse a job payload.
pub fn load_job(path: &Path) -> anyhow::Result<Job> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading job {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing job {}", path.display()))
}
