//! Drives one job through an executor.
//!
//! Stage order: `prepare`, `get-sources`, `restore-cache`,
//! `download-dependencies`, `user-script`; then `after-script`; then the
//! success or failure variants of `archive-cache` and `upload-artifacts`;
//! finally `cleanup-file-variables`. `finish` and `cleanup` always run.
mod deadline;
use deadline::Deadline;

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use gantry_model::{BuildStage, Job, RunnerConfig, StepName, seconds_or_default};
use gantry_observe::JobTrace;
use gantry_shell::{CacheUrlResolver, Shell, ShellRegistry, ShellScriptInfo};

use crate::{
    Executor, ExecutorCommand, ExecutorRegistry, ExecutorResult, PrepareOptions,
};

pub const DEFAULT_AFTER_SCRIPT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const MAIN_STAGES: [BuildStage; 5] = [
    BuildStage::Prepare,
    BuildStage::GetSources,
    BuildStage::RestoreCache,
    BuildStage::DownloadDependencies,
    BuildStage::UserScript,
];

const ON_SUCCESS: [BuildStage; 2] = [BuildStage::ArchiveCache, BuildStage::UploadArtifactsOnSuccess];
const ON_FAILURE: [BuildStage; 2] = [
    BuildStage::ArchiveCacheOnFailure,
    BuildStage::UploadArtifactsOnFailure,
];

pub struct JobRunner<'a> {
    executors: &'a ExecutorRegistry,
    shells: &'a ShellRegistry,
    after_script_timeout: Duration,
    cache_urls: Option<Arc<dyn CacheUrlResolver>>,
}

impl<'a> JobRunner<'a> {
    pub fn new(executors: &'a ExecutorRegistry, shells: &'a ShellRegistry) -> Self {
        Self {
            executors,
            shells,
            after_script_timeout: DEFAULT_AFTER_SCRIPT_TIMEOUT,
            cache_urls: None,
        }
    }

    pub fn with_after_script_timeout(mut self, timeout: Duration) -> Self {
        self.after_script_timeout = timeout;
        self
    }

    /// Presign cache transfers through `resolver`.
    pub fn with_cache_urls(mut self, resolver: Arc<dyn CacheUrlResolver>) -> Self {
        self.cache_urls = Some(resolver);
        self
    }

    /// Run `job` to completion.
    ///
    /// The job timeout cancels a child of `cancel`. Capacity is reserved
    /// before the executor is created and handed to it; the executor
    /// releases it during cleanup.
    #[instrument(
        level = "info",
        skip_all,
        fields(job = job.id, runner = config.short_token(), executor = %config.executor)
    )]
    pub async fn run(
        &self,
        job: Arc<Job>,
        config: Arc<RunnerConfig>,
        trace: Arc<dyn JobTrace>,
        cancel: CancellationToken,
    ) -> ExecutorResult<()> {
        let provider = self.executors.resolve(&config.executor)?;
        let shell = self.shells.resolve(Some(&config.shell))?;
        let data = provider.acquire(&config).await?;
        let mut executor = provider.create();

        let timeout = Duration::from_secs(job.timeout_secs());
        let deadline = Deadline::new(&cancel, timeout);
        debug!(shell = shell.name(), ?timeout, "starting job");

        let options = PrepareOptions {
            job: Arc::clone(&job),
            config: Arc::clone(&config),
            shell: Arc::clone(&shell),
            trace,
            data,
            cancel: deadline.token().clone(),
        };
        let result = match executor.prepare(options).await {
            Ok(()) => {
                self.run_stages(executor.as_mut(), &job, &config, shell.as_ref(), &deadline)
                    .await
            }
            Err(e) => Err(e),
        };
        let result = result.map_err(|e| deadline.explain(e));

        match &result {
            Ok(()) => info!("job succeeded"),
            Err(e) if e.is_build_failure() => info!(error = %e, "job failed"),
            Err(e) => warn!(error = %e, "job failed"),
        }

        executor.finish(result.as_ref().err()).await;
        executor.cleanup().await;
        result
    }

    async fn run_stages(
        &self,
        executor: &mut dyn Executor,
        job: &Job,
        config: &RunnerConfig,
        shell: &dyn Shell,
        deadline: &Deadline,
    ) -> ExecutorResult<()> {
        let token = deadline.token();

        let mut result = Ok(());
        for stage in MAIN_STAGES {
            if let Err(e) = self.run_stage(executor, job, config, shell, stage, token.child_token()).await {
                result = Err(e);
                break;
            }
        }
        if token.is_cancelled() {
            return result;
        }

        let after_timeout = seconds_or_default(
            job.step(StepName::AfterScript).and_then(|s| s.timeout),
            self.after_script_timeout,
        );
        let after = Deadline::new(token, after_timeout);
        if let Err(e) = self.run_stage(
            executor,
            job,
            config,
            shell,
            BuildStage::AfterScript,
            after.token().child_token(),
        )
        .await
        {
            warn!(error = %after.explain(e), "after-script failed");
        }
        drop(after);
        if token.is_cancelled() {
            return result;
        }

        let tail = if result.is_ok() { ON_SUCCESS } else { ON_FAILURE };
        for stage in tail.into_iter().chain([BuildStage::CleanupFileVariables]) {
            if let Err(e) = self.run_stage(executor, job, config, shell, stage, token.child_token()).await {
                warn!(%stage, error = %e, "stage failed");
                if token.is_cancelled() {
                    break;
                }
            }
        }
        result
    }

    async fn run_stage(
        &self,
        executor: &mut dyn Executor,
        job: &Job,
        config: &RunnerConfig,
        shell: &dyn Shell,
        stage: BuildStage,
        cancel: CancellationToken,
    ) -> ExecutorResult<()> {
        let script = {
            let paths = executor.paths().clone();
            let mut info = ShellScriptInfo::new(job, config, paths.build_dir);
            info.cache_dir = paths.cache_dir;
            info.hostname = paths.hostname;
            info.cache_urls = self.cache_urls.as_deref();
            shell.generate_script(stage, &info)?
        };
        let Some(script) = script else {
            debug!(%stage, "stage has nothing to run");
            return Ok(());
        };

        debug!(%stage, "running stage");
        executor.run(ExecutorCommand { stage, script, cancel }).await
    }
}
