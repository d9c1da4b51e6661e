use std::time::Duration;

use thiserror::Error;

use gantry_core::ExecutorError;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("process did not exit within {0:?} of SIGKILL, likely dormant; giving up")]
    Dormant(Duration),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ProcessResult<T> = Result<T, ProcessError>;

impl From<ProcessError> for ExecutorError {
    fn from(e: ProcessError) -> Self {
        match e {
            ProcessError::Dormant(_) => ExecutorError::Dormant,
            ProcessError::Io(e) => ExecutorError::Io(e),
            other => ExecutorError::System(other.to_string()),
        }
    }
}
