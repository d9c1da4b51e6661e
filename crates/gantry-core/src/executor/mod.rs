//! Executor abstraction driven by [`JobRunner`](crate::JobRunner).
//!
//! Backends implement [`Executor`] and are created through an
//! [`ExecutorProvider`](crate::ExecutorProvider) registered by name.
mod paths;
pub use paths::BuildPaths;

mod state;
pub use state::ExecutorState;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use gantry_model::{BuildStage, ExecutorStage, Job, RunnerConfig};
use gantry_observe::JobTrace;
use gantry_shell::Shell;

use crate::{ExecutorData, ExecutorError, ExecutorResult};

/// Inputs bound to an executor for the lifetime of one job.
pub struct PrepareOptions {
    pub job: Arc<Job>,
    pub config: Arc<RunnerConfig>,
    pub shell: Arc<dyn Shell>,
    /// Sink for the job's output.
    pub trace: Arc<dyn JobTrace>,
    /// Handle from [`ExecutorProvider::acquire`](crate::ExecutorProvider::acquire); the executor owns it from here on.
    pub data: Option<ExecutorData>,
    pub cancel: CancellationToken,
}

/// One stage script to run.
#[derive(Debug, Clone)]
pub struct ExecutorCommand {
    pub stage: BuildStage,
    pub script: String,
    /// Cancels only this stage.
    pub cancel: CancellationToken,
}

/// Backend that runs stage scripts.
///
/// Calls arrive in a fixed order: `prepare`, any number of sequential
/// `run`s, `finish`, `cleanup`. `cleanup` must tolerate a failed or partial
/// `prepare` and must be a no-op the second time.
#[async_trait]
pub trait Executor: Send {
    async fn prepare(&mut self, options: PrepareOptions) -> ExecutorResult<()>;

    /// Directories and host the job runs with; meaningful after `prepare`.
    fn paths(&self) -> &BuildPaths;

    async fn run(&mut self, cmd: ExecutorCommand) -> ExecutorResult<()>;

    /// Outcome of the job, `None` on success.
    async fn finish(&mut self, err: Option<&ExecutorError>);

    async fn cleanup(&mut self);

    fn current_stage(&self) -> ExecutorStage;

    fn set_current_stage(&mut self, stage: ExecutorStage);
}
