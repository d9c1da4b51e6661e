//! Executor delegating every step to user-supplied driver programs.
//!
//! `config_exec` may override directories, `prepare_exec` readies the
//! environment, `run_exec <args> <script> <stage>` runs each stage and
//! `cleanup_exec` tears down. Drivers see job variables as
//! `CUSTOM_ENV_<KEY>` and signal failures with the sentinel exit codes.
mod config;
pub use config::DriverConfig;

use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use gantry_core::{
    BuildPaths, Executor, ExecutorCommand, ExecutorError, ExecutorProvider, ExecutorResult,
    ExecutorState, PrepareOptions,
};
use gantry_model::{CustomConfig, ExecutorStage};

use crate::{
    binding::Binding,
    exit::{ExitCodes, classify_exit, sentinel_env},
    host::hostname,
    process::{KillPolicy, ProcessExit, run_captured, run_traced},
};

const CUSTOM_ENV_PREFIX: &str = "CUSTOM_ENV_";

pub struct CustomProvider {
    cwd: PathBuf,
}

impl CustomProvider {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }
}

#[async_trait]
impl ExecutorProvider for CustomProvider {
    fn name(&self) -> &str {
        "custom"
    }

    fn create(&self) -> Box<dyn Executor> {
        Box::new(CustomExecutor::new(self.cwd.clone()))
    }
}

pub struct CustomExecutor {
    cwd: PathBuf,
    state: ExecutorState,
    paths: BuildPaths,
    kill: KillPolicy,
    custom: Option<CustomConfig>,
    binding: Option<Binding>,
    job_env: BTreeMap<String, String>,
}

impl CustomExecutor {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            state: ExecutorState::default(),
            paths: BuildPaths::default(),
            kill: KillPolicy::default(),
            custom: None,
            binding: None,
            job_env: BTreeMap::new(),
        }
    }

    fn driver(&self, binding: &Binding, program: &str, args: &[String]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&self.cwd).envs(sentinel_env());
        for var in binding.job.variables.public() {
            cmd.env(format!("{CUSTOM_ENV_PREFIX}{}", var.key), &var.value);
        }
        cmd.envs(&self.job_env);
        cmd
    }

    async fn configure(
        &mut self,
        binding: &Binding,
        custom: &CustomConfig,
        cancel: &CancellationToken,
    ) -> ExecutorResult<()> {
        let mut config = DriverConfig::default();
        if let Some(exec) = custom.config_exec.as_deref().filter(|e| !e.is_empty()) {
            let timeout = custom.config_timeout();
            let cmd = self.driver(binding, exec, &custom.config_args);
            let (exit, stdout) =
                run_captured(cmd, &binding.trace, cancel, Some(timeout), self.kill).await?;
            driver_outcome(exit, timeout)?;
            config = DriverConfig::parse(&stdout).map_err(|e| {
                ExecutorError::System(format!("config_exec printed invalid JSON: {e}"))
            })?;
            debug!(?config, "driver configuration applied");
        }

        let runner = config.apply(&binding.config);
        let host = config.hostname.clone().filter(|h| !h.is_empty()).unwrap_or_else(hostname);
        self.paths = BuildPaths::resolve(&runner, &binding.job, &self.cwd).with_hostname(host);
        self.job_env = config.job_env;
        Ok(())
    }
}

#[async_trait]
impl Executor for CustomExecutor {
    #[instrument(level = "debug", skip_all, fields(job = options.job.id))]
    async fn prepare(&mut self, options: PrepareOptions) -> ExecutorResult<()> {
        self.state.begin_prepare()?;
        if options.data.is_some() {
            warn!("custom executor got a capacity handle it cannot use");
        }
        let custom = options
            .config
            .custom
            .clone()
            .filter(|c| !c.run_exec.trim().is_empty())
            .ok_or_else(|| {
                ExecutorError::System("custom executor requires custom.run_exec".to_string())
            })?;
        self.kill = KillPolicy {
            graceful: custom.graceful_kill(),
            force: custom.force_kill(),
        };

        let binding = Binding::new(&options);
        binding.trace.notice("Using custom executor...");
        let configured = self.configure(&binding, &custom, &options.cancel).await;
        self.custom = Some(custom.clone());
        self.binding = Some(binding);
        configured?;

        if let Some(exec) = custom.prepare_exec.as_deref().filter(|e| !e.is_empty()) {
            let Some(binding) = &self.binding else {
                return Err(ExecutorError::System("custom executor lost its job".into()));
            };
            let timeout = custom.prepare_timeout();
            let cmd = self.driver(binding, exec, &custom.prepare_args);
            let exit =
                run_traced(cmd, &binding.trace, &options.cancel, Some(timeout), self.kill).await?;
            driver_outcome(exit, timeout)?;
        }

        self.state.prepared();
        Ok(())
    }

    fn paths(&self) -> &BuildPaths {
        &self.paths
    }

    #[instrument(level = "debug", skip_all, fields(stage = %cmd.stage))]
    async fn run(&mut self, cmd: ExecutorCommand) -> ExecutorResult<()> {
        self.state.begin_run(cmd.stage)?;
        let (Some(binding), Some(custom)) = (&self.binding, &self.custom) else {
            return Err(ExecutorError::InvalidState {
                op: "run",
                stage: self.state.stage(),
            });
        };
        if cmd.cancel.is_cancelled() {
            return Err(ExecutorError::Canceled);
        }

        let script = binding
            .scripts
            .write(cmd.stage, binding.shell.extension(), &cmd.script)
            .await?;
        let mut driver = self.driver(binding, &custom.run_exec, &custom.run_args);
        driver.arg(&script).arg(cmd.stage.as_str());

        match run_traced(driver, &binding.trace, &cmd.cancel, None, self.kill).await? {
            ProcessExit::Exited(status) => classify_exit(status, ExitCodes::Driver),
            ProcessExit::Canceled(_) | ProcessExit::TimedOut(_) => Err(ExecutorError::Killed),
        }
    }

    async fn finish(&mut self, err: Option<&ExecutorError>) {
        if !self.state.begin_finish() {
            return;
        }
        if let Some(err) = err {
            debug!(error = %err, "custom job finished with error");
        }
        self.state.finished();
    }

    async fn cleanup(&mut self) {
        if !self.state.begin_cleanup() {
            return;
        }
        if let (Some(binding), Some(custom)) = (&self.binding, &self.custom) {
            if let Some(exec) = custom.cleanup_exec.as_deref().filter(|e| !e.is_empty()) {
                let timeout = custom.cleanup_timeout();
                let cmd = self.driver(binding, exec, &custom.cleanup_args);
                let cancel = CancellationToken::new();
                let result = match run_traced(cmd, &binding.trace, &cancel, Some(timeout), self.kill)
                    .await
                {
                    Ok(exit) => driver_outcome(exit, timeout),
                    Err(e) => Err(e.into()),
                };
                if let Err(e) = result {
                    warn!(error = %e, "cleanup_exec failed");
                    binding.trace.notice(&format!("WARNING: cleanup script failed: {e}"));
                }
            }
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

fn driver_outcome(exit: ProcessExit, timeout: Duration) -> ExecutorResult<()> {
    match exit {
        ProcessExit::Exited(status) => classify_exit(status, ExitCodes::Driver),
        ProcessExit::Canceled(_) => Err(ExecutorError::Killed),
        ProcessExit::TimedOut(_) => Err(ExecutorError::Timeout(timeout)),
    }
}
