//! Static runner configuration.
//!
//! All structs deserialize with `#[serde(default)]`; timeouts are optional
//! seconds resolved through [`seconds_or_default`].
mod runner;
pub use runner::RunnerConfig;

mod autoscaler;
pub use autoscaler::{AutoscalerConfig, AutoscalerPolicy, ConnectorConfig, VmIsolation};

mod custom;
pub use custom::{CustomConfig, ProcessConfig};
pub use custom::{DEFAULT_EXEC_TIMEOUT, DEFAULT_FORCE_KILL_TIMEOUT, DEFAULT_GRACEFUL_KILL_TIMEOUT};

mod flags;
pub use flags::FeatureFlags;

use std::time::Duration;

/// Resolve an optional seconds value, falling back to `default` when the
/// value is absent or non-positive.
pub fn seconds_or_default(value: Option<i64>, default: Duration) -> Duration {
    match value {
        Some(secs) if secs > 0 => Duration::from_secs(secs as u64),
        _ => default,
    }
}
