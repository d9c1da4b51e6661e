use thiserror::Error;

use gantry_model::ModelError;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("unknown build stage: {0}")]
    UnknownStage(String),

    #[error("shell '{0}' is not registered")]
    UnknownShell(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("invalid structured script: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ShellResult<T> = Result<T, ShellError>;
