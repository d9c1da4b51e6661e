use std::time::Duration;

use serde::{Deserialize, Serialize};

#[cfg(feature = "schema")]
use schemars::JsonSchema;

use super::seconds_or_default;

pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(3600);
pub const DEFAULT_GRACEFUL_KILL_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_FORCE_KILL_TIMEOUT: Duration = Duration::from_secs(10);

/// Kill escalation settings for locally spawned job processes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(default)]
pub struct ProcessConfig {
    pub graceful_kill_timeout: Option<i64>,
    pub force_kill_timeout: Option<i64>,
}

impl ProcessConfig {
    pub fn graceful_kill(&self) -> Duration {
        seconds_or_default(self.graceful_kill_timeout, DEFAULT_GRACEFUL_KILL_TIMEOUT)
    }

    pub fn force_kill(&self) -> Duration {
        seconds_or_default(self.force_kill_timeout, DEFAULT_FORCE_KILL_TIMEOUT)
    }
}

/// Driver scripts of the custom executor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(default)]
pub struct CustomConfig {
    pub config_exec: Option<String>,
    pub config_args: Vec<String>,
    pub config_exec_timeout: Option<i64>,

    pub prepare_exec: Option<String>,
    pub prepare_args: Vec<String>,
    pub prepare_exec_timeout: Option<i64>,

    pub run_exec: String,
    pub run_args: Vec<String>,

    pub cleanup_exec: Option<String>,
    pub cleanup_args: Vec<String>,
    pub cleanup_exec_timeout: Option<i64>,

    pub graceful_kill_timeout: Option<i64>,
    pub force_kill_timeout: Option<i64>,
}

impl CustomConfig {
    pub fn config_timeout(&self) -> Duration {
        seconds_or_default(self.config_exec_timeout, DEFAULT_EXEC_TIMEOUT)
    }

    pub fn prepare_timeout(&self) -> Duration {
        seconds_or_default(self.prepare_exec_timeout, DEFAULT_EXEC_TIMEOUT)
    }

    pub fn cleanup_timeout(&self) -> Duration {
        seconds_or_default(self.cleanup_exec_timeout, DEFAULT_EXEC_TIMEOUT)
    }

    pub fn graceful_kill(&self) -> Duration {
        seconds_or_default(self.graceful_kill_timeout, DEFAULT_GRACEFUL_KILL_TIMEOUT)
    }

    pub fn force_kill(&self) -> Duration {
        seconds_or_default(self.force_kill_timeout, DEFAULT_FORCE_KILL_TIMEOUT)
    }
}
