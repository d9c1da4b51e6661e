use std::time::Duration;

use thiserror::Error;

use gantry_model::ExecutorStage;
use gantry_shell::ShellError;

/// Failures of a capacity provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("already at capacity: {0}")]
    Capacity(String),

    #[error("runner {0} has no autoscaler configuration")]
    NotConfigured(String),

    #[error("fleet error: {0}")]
    Fleet(String),
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The job's own script failed.
    #[error("build failed with exit code {exit_code}")]
    Build { exit_code: i32 },

    /// The runner's machinery failed.
    #[error("system failure: {0}")]
    System(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("acquisition failed: {0}")]
    Acquisition(String),

    #[error("job canceled")]
    Canceled,

    #[error("process terminated after cancellation")]
    Killed,

    #[error("process did not exit after being killed, likely dormant; giving up")]
    Dormant,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{op} is not allowed while {stage}")]
    InvalidState {
        op: &'static str,
        stage: ExecutorStage,
    },

    #[error("no executor registered as '{0}'")]
    UnknownExecutor(String),

    #[error(transparent)]
    Shell(#[from] ShellError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutorError {
    /// The job failed on its own; not a runner fault.
    pub fn is_build_failure(&self) -> bool {
        matches!(self, ExecutorError::Build { .. })
    }

    /// The job was stopped from outside rather than failing.
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            ExecutorError::Canceled
                | ExecutorError::Killed
                | ExecutorError::Dormant
                | ExecutorError::Timeout(_)
        )
    }
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
