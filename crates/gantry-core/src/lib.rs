//! Executor lifecycle for gantry.
//!
//! An [`ExecutorProvider`] creates [`Executor`]s and optionally reserves
//! capacity for them; [`JobRunner`] drives one job through the fixed stage
//! order and always finishes and cleans up.
mod error;
pub use error::{ExecutorError, ExecutorResult, ProviderError};

mod data;
pub use data::{AcquisitionRef, ExecutorData};

mod executor;
pub use executor::{BuildPaths, Executor, ExecutorCommand, ExecutorState, PrepareOptions};

mod provider;
pub use provider::ExecutorProvider;

mod registry;
pub use registry::ExecutorRegistry;

mod runner;
pub use runner::{DEFAULT_AFTER_SCRIPT_TIMEOUT, JobRunner};

#[cfg(test)]
mod testing;
