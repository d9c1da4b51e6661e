use std::time::Duration;

use thiserror::Error;

use gantry_core::{ExecutorError, ProviderError};

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("fleet plugin: {0}")]
    Plugin(String),
    #[error("no capacity: {0}")]
    Capacity(String),
    #[error("acquiring instance timed out after {0:?}")]
    AcquireTimeout(Duration),
    #[error("getting instance connect info: {0}")]
    ConnectInfo(String),
    #[error("dialing instance: {0}")]
    Dial(String),
    #[error("connecting to nesting daemon: {0}")]
    Nesting(String),
    #[error("creating nested vm: {0}")]
    NestedVm(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("remote command: {0}")]
    Command(String),
    #[error("canceled")]
    Canceled,
}

impl FleetError {
    /// Failures that count against the instance's health.
    pub fn is_instance_fault(&self) -> bool {
        matches!(
            self,
            FleetError::ConnectInfo(_)
                | FleetError::Dial(_)
                | FleetError::Nesting(_)
                | FleetError::NestedVm(_)
        )
    }
}

pub type FleetResult<T> = Result<T, FleetError>;

impl From<FleetError> for ProviderError {
    fn from(e: FleetError) -> Self {
        ProviderError::Fleet(e.to_string())
    }
}

impl From<FleetError> for ExecutorError {
    fn from(e: FleetError) -> Self {
        match e {
            FleetError::Canceled => ExecutorError::Canceled,
            FleetError::Capacity(_) | FleetError::AcquireTimeout(_) => {
                ExecutorError::Acquisition(e.to_string())
            }
            other => ExecutorError::System(other.to_string()),
        }
    }
}
