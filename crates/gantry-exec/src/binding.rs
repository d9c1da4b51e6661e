use std::sync::Arc;

use tokio::process::Command;

use gantry_core::{ExecutorCommand, ExecutorResult, PrepareOptions};
use gantry_model::{Job, RunnerConfig};
use gantry_observe::JobTrace;
use gantry_shell::Shell;

use crate::{exit::sentinel_env, script::ScriptDir};

/// Job inputs an executor keeps between `prepare` and `cleanup`.
pub(crate) struct Binding {
    pub(crate) job: Arc<Job>,
    pub(crate) config: Arc<RunnerConfig>,
    pub(crate) shell: Arc<dyn Shell>,
    pub(crate) trace: Arc<dyn JobTrace>,
    pub(crate) scripts: ScriptDir,
}

impl Binding {
    pub(crate) fn new(options: &PrepareOptions) -> Self {
        Self {
            job: Arc::clone(&options.job),
            config: Arc::clone(&options.config),
            shell: Arc::clone(&options.shell),
            trace: Arc::clone(&options.trace),
            scripts: ScriptDir::for_job(&options.job, &options.config),
        }
    }

    /// Save the stage script and build the shell command that runs it.
    pub(crate) async fn script_command(&self, cmd: &ExecutorCommand) -> ExecutorResult<Command> {
        let path = self
            .scripts
            .write(cmd.stage, self.shell.extension(), &cmd.script)
            .await?;
        let sc = self.shell.script_command(&path.to_string_lossy());
        let mut command = Command::new(&sc.program);
        command.args(&sc.args);
        command.envs(sentinel_env());
        Ok(command)
    }
}
