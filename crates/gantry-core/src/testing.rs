//! In-memory executor used by the lifecycle tests.
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gantry_model::{BuildStage, ExecutorStage, RunnerConfig};

use crate::{
    AcquisitionRef, BuildPaths, Executor, ExecutorCommand, ExecutorData, ExecutorError,
    ExecutorProvider, ExecutorResult, ExecutorState, PrepareOptions, ProviderError,
};

#[derive(Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Clone, Default)]
struct Behavior {
    capacity: bool,
    fail_prepare: bool,
    fail_stage: Option<BuildStage>,
    hang_stage: Option<BuildStage>,
}

/// Scripts handed to `run`, in order.
pub(crate) type ScriptLog = Arc<Mutex<Vec<(BuildStage, String)>>>;

pub(crate) struct FakeProvider {
    name: &'static str,
    log: CallLog,
    scripts: ScriptLog,
    behavior: Behavior,
}

impl FakeProvider {
    pub(crate) fn new(name: &'static str, log: CallLog) -> Self {
        Self {
            name,
            log,
            scripts: ScriptLog::default(),
            behavior: Behavior::default(),
        }
    }

    pub(crate) fn scripts(&self) -> ScriptLog {
        Arc::clone(&self.scripts)
    }

    pub(crate) fn with_capacity(mut self) -> Self {
        self.behavior.capacity = true;
        self
    }

    pub(crate) fn failing_prepare(mut self) -> Self {
        self.behavior.fail_prepare = true;
        self
    }

    pub(crate) fn failing_stage(mut self, stage: BuildStage) -> Self {
        self.behavior.fail_stage = Some(stage);
        self
    }

    pub(crate) fn hanging_stage(mut self, stage: BuildStage) -> Self {
        self.behavior.hang_stage = Some(stage);
        self
    }
}

#[async_trait]
impl ExecutorProvider for FakeProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn acquire(&self, config: &RunnerConfig) -> Result<Option<ExecutorData>, ProviderError> {
        if !self.behavior.capacity {
            return Ok(None);
        }
        self.log.push("acquire");
        Ok(Some(ExecutorData::Acquisition(AcquisitionRef::new(&config.token))))
    }

    fn create(&self) -> Box<dyn Executor> {
        Box::new(FakeExecutor {
            log: self.log.clone(),
            scripts: Arc::clone(&self.scripts),
            behavior: self.behavior.clone(),
            state: ExecutorState::default(),
            paths: BuildPaths::default(),
            data: None,
        })
    }
}

struct FakeExecutor {
    log: CallLog,
    scripts: ScriptLog,
    behavior: Behavior,
    state: ExecutorState,
    paths: BuildPaths,
    data: Option<ExecutorData>,
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn prepare(&mut self, options: PrepareOptions) -> ExecutorResult<()> {
        self.state.begin_prepare()?;
        self.log.push("prepare");
        self.data = options.data;
        if self.behavior.fail_prepare {
            return Err(ExecutorError::System("prepare failed".into()));
        }
        self.paths = BuildPaths {
            build_dir: "/builds/p".into(),
            cache_dir: "/cache".into(),
            hostname: "fake".into(),
        };
        self.state.prepared();
        Ok(())
    }

    fn paths(&self) -> &BuildPaths {
        &self.paths
    }

    async fn run(&mut self, cmd: ExecutorCommand) -> ExecutorResult<()> {
        self.state.begin_run(cmd.stage)?;
        self.log.push(format!("run:{}", cmd.stage));
        self.scripts.lock().unwrap().push((cmd.stage, cmd.script.clone()));
        if cmd.cancel.is_cancelled() {
            return Err(ExecutorError::Canceled);
        }
        if self.behavior.hang_stage == Some(cmd.stage) {
            cmd.cancel.cancelled().await;
            return Err(ExecutorError::Killed);
        }
        if self.behavior.fail_stage == Some(cmd.stage) {
            return Err(ExecutorError::Build { exit_code: 1 });
        }
        Ok(())
    }

    async fn finish(&mut self, err: Option<&ExecutorError>) {
        if self.state.begin_finish() {
            self.log.push(if err.is_some() { "finish:err" } else { "finish:ok" });
            self.state.finished();
        }
    }

    async fn cleanup(&mut self) {
        if !self.state.begin_cleanup() {
            return;
        }
        self.log.push("cleanup");
        if self.data.take().is_some() {
            self.log.push("release");
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cleanup_twice_is_a_no_op() {
        let log = CallLog::default();
        let mut executor = FakeProvider::new("fake", log.clone()).failing_prepare().create();
        let options = PrepareOptions {
            job: Arc::default(),
            config: Arc::default(),
            shell: Arc::new(gantry_shell::BashShell::sh()),
            trace: Arc::new(gantry_observe::BufferTrace::new()),
            data: Some(ExecutorData::Acquisition(AcquisitionRef::new("t"))),
            cancel: Default::default(),
        };
        assert!(executor.prepare(options).await.is_err());
        executor.cleanup().await;
        executor.cleanup().await;
        assert_eq!(log.entries(), vec!["prepare", "cleanup", "release"]);
        assert_eq!(executor.current_stage(), ExecutorStage::CleanedUp);
    }
}
