//! Local executor: stage scripts run as child processes of the agent.
use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use gantry_core::{
    BuildPaths, Executor, ExecutorCommand, ExecutorError, ExecutorProvider, ExecutorResult,
    ExecutorState, PrepareOptions,
};
use gantry_model::ExecutorStage;

use crate::{
    binding::Binding,
    exit::{ExitCodes, classify_exit},
    host::hostname,
    process::{KillPolicy, ProcessExit, run_traced},
};

pub struct ShellProvider {
    cwd: PathBuf,
}

impl ShellProvider {
    /// Provider whose relative build directories resolve against `cwd`.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }
}

#[async_trait]
impl ExecutorProvider for ShellProvider {
    fn name(&self) -> &str {
        "shell"
    }

    fn create(&self) -> Box<dyn Executor> {
        Box::new(ShellExecutor::new(self.cwd.clone()))
    }
}

pub struct ShellExecutor {
    cwd: PathBuf,
    state: ExecutorState,
    paths: BuildPaths,
    kill: KillPolicy,
    binding: Option<Binding>,
}

impl ShellExecutor {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            state: ExecutorState::default(),
            paths: BuildPaths::default(),
            kill: KillPolicy::default(),
            binding: None,
        }
    }
}

#[async_trait]
impl Executor for ShellExecutor {
    #[instrument(level = "debug", skip_all, fields(job = options.job.id))]
    async fn prepare(&mut self, options: PrepareOptions) -> ExecutorResult<()> {
        self.state.begin_prepare()?;
        if options.data.is_some() {
            warn!("shell executor got a capacity handle it cannot use");
        }
        if options.cancel.is_cancelled() {
            return Err(ExecutorError::Canceled);
        }

        let binding = Binding::new(&options);
        self.paths = BuildPaths::resolve(&binding.config, &binding.job, &self.cwd)
            .with_hostname(hostname());
        self.kill = KillPolicy {
            graceful: binding.config.process.graceful_kill(),
            force: binding.config.process.force_kill(),
        };
        binding
            .trace
            .notice(&format!("Using shell executor with {}...", binding.shell.name()));
        debug!(build_dir = %self.paths.build_dir, "shell executor prepared");

        self.binding = Some(binding);
        self.state.prepared();
        Ok(())
    }

    fn paths(&self) -> &BuildPaths {
        &self.paths
    }

    #[instrument(level = "debug", skip_all, fields(stage = %cmd.stage))]
    async fn run(&mut self, cmd: ExecutorCommand) -> ExecutorResult<()> {
        self.state.begin_run(cmd.stage)?;
        let Some(binding) = &self.binding else {
            return Err(ExecutorError::InvalidState {
                op: "run",
                stage: self.state.stage(),
            });
        };
        if cmd.cancel.is_cancelled() {
            return Err(ExecutorError::Canceled);
        }

        let mut command = binding.script_command(&cmd).await?;
        command.current_dir(&self.cwd);

        match run_traced(command, &binding.trace, &cmd.cancel, None, self.kill).await? {
            ProcessExit::Exited(status) => classify_exit(status, ExitCodes::Script),
            ProcessExit::Canceled(_) | ProcessExit::TimedOut(_) => Err(ExecutorError::Killed),
        }
    }

    async fn finish(&mut self, err: Option<&ExecutorError>) {
        if !self.state.begin_finish() {
            return;
        }
        if let Some(err) = err {
            debug!(error = %err, "shell job finished with error");
        }
        self.state.finished();
    }

    async fn cleanup(&mut self) {
        if !self.state.begin_cleanup() {
            return;
        }
        if let Some(binding) = &self.binding {
            binding.scripts.remove().await;
        }
        self.state.cleaned_up();
    }

    fn current_stage(&self) -> ExecutorStage {
        self.state.stage()
    }

    fn set_current_stage(&mut self, stage: ExecutorStage) {
        self.state.set(stage);
    }
}
