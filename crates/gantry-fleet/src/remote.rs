use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use gantry_core::{
    BuildPaths, Executor, ExecutorCommand, ExecutorError, ExecutorResult, ExecutorState,
    PrepareOptions,
};
use gantry_exec::sentinel_env;
use gantry_model::ExecutorStage;
use gantry_observe::JobTrace;
use gantry_shell::Shell;

use crate::{Client, FleetError, RunOptions};

/// Base for relative build and cache directories on a remote host.
const REMOTE_ROOT: &str = "/";

/// Runs stage scripts through a connected [`Client`], script on stdin.
pub struct RemoteShellExecutor {
    client: Box<dyn Client>,
    hostname: String,
    state: ExecutorState,
    paths: BuildPaths,
    session: Option<(Arc<dyn Shell>, Arc<dyn JobTrace>)>,
}

impl RemoteShellExecutor {
    pub fn new(client: Box<dyn Client>, hostname: impl Into<String>) -> Self {
        Self {
            client,
            hostname: hostname.into(),
            state: ExecutorState::default(),
            paths: BuildPaths::default(),
            session: None,
        }
    }
}

#[async_trait]
impl Executor for RemoteShellExecutor {
    #[instrument(level = "debug", skip_all, fields(job = options.job.id, host = %self.hostname))]
    async fn prepare(&mut self, options: PrepareOptions) -> ExecutorResult<()> {
        self.state.begin_prepare()?;
        if options.cancel.is_cancelled() {
            return Err(ExecutorError::Canceled);
        }
        self.paths = BuildPaths::resolve(&options.config, &options.job, Path::new(REMOTE_ROOT))
            .with_hostname(self.hostname.clone());
        options.trace.notice(&format!(
            "Using remote {} on {}...",
            options.shell.name(),
            self.hostname
        ));
        self.session = Some((options.shell, options.trace));
        self.state.prepared();
        Ok(())
    }

    fn paths(&self) -> &BuildPaths {
        &self.paths
    }

    #[instrument(level = "debug", skip_all, fields(stage = %cmd.stage))]
    async fn run(&mut self, cmd: ExecutorCommand) -> ExecutorResult<()> {
        self.state.begin_run(cmd.stage)?;
        let Some((shell, trace)) = &self.session else {
            return Err(ExecutorError::InvalidState {
                op: "run",
                stage: self.state.stage(),
            });
        };
        if cmd.cancel.is_cancelled() {
            return Err(ExecutorError::Canceled);
        }

        let sc = shell.script_command("-");
        let opts = RunOptions {
            program: sc.program,
            args: sc.args,
            env: sentinel_env()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            stdin: cmd.script,
        };
        match self.client.run(opts, trace, &cmd.cancel).await {
            Ok(0) => Ok(()),
            Ok(exit_code) => Err(ExecutorError::Build { exit_code }),
            Err(FleetError::Canceled) => Err(ExecutorError::Killed),
            Err(e) => Err(e.into()),
        }
    }

    async fn finish(&mut self, err: Option<&ExecutorError>) {
        if !self.state.begin_finish() {
            return;
        }
        if let Some(err) = err {
            debug!(error = %err, "remote job finished with error");
        }
        self.state.finished();
    }

    async fn cleanup(&mut self) {
        if !self.state.begin_cleanup() {
            return;
        }
        if let Err(e) = self.client.close().await {
            warn!(host = %self.hostname, error = %e, "closing connection");
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
