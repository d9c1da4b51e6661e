use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown git strategy: {0}")]
    UnknownGitStrategy(String),

    #[error("unknown submodule strategy: {0}")]
    UnknownSubmoduleStrategy(String),

    #[error("unknown cache policy: {0}")]
    UnknownCachePolicy(String),

    #[error("unknown build stage: {0}")]
    UnknownStage(String),

    #[error("invalid model: {0}")]
    Invalid(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
