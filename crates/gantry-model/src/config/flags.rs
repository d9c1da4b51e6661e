use serde::{Deserialize, Serialize};

#[cfg(feature = "schema")]
use schemars::JsonSchema;

use crate::Variables;

/// Behavioral switches. Each may be overridden per job with
/// `FF_<NAME>=true|false`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(default)]
pub struct FeatureFlags {
    /// Remove the build directory in the cleanup stage.
    pub enable_job_cleanup: bool,
    /// Echo every line of a multi-line command.
    pub trace_multiline_commands: bool,
    /// Check `$?` after each traced script line.
    pub use_exit_code_check: bool,
}

impl FeatureFlags {
    /// Apply `FF_*` overrides found in the job variables.
    pub fn resolve(self, vars: &Variables) -> Self {
        let pick = |name: &str, current: bool| vars.bool(name).unwrap_or(current);
        Self {
            enable_job_cleanup: pick("FF_ENABLE_JOB_CLEANUP", self.enable_job_cleanup),
            trace_multiline_commands: pick(
                "FF_TRACE_MULTILINE_COMMANDS",
                self.trace_multiline_commands,
            ),
            use_exit_code_check: pick("FF_USE_EXIT_CODE_CHECK", self.use_exit_code_check),
        }
    }
}
