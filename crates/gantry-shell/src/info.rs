use gantry_model::{FeatureFlags, Job, RunnerConfig};

/// Helper binary used when the runner does not name one.
pub const DEFAULT_HELPER_COMMAND: &str = "gantry-helper";

/// Presigned cache URLs, when the runner has a cache server configured.
pub trait CacheUrlResolver: Send + Sync {
    fn download_url(&self, key: &str) -> Option<String>;
    fn upload_url(&self, key: &str) -> Option<String>;
}

/// Everything the stage generator reads while rendering one stage.
#[derive(Clone)]
pub struct ShellScriptInfo<'a> {
    pub job: &'a Job,
    pub runner: &'a RunnerConfig,
    /// Working tree of the job.
    pub build_dir: String,
    pub cache_dir: String,
    /// Job-scoped directory for file variables and git templates.
    pub temp_dir: String,
    pub hostname: String,
    /// Binary providing the `cache-*`/`artifacts-*` helper subcommands.
    pub runner_command: String,
    pub flags: FeatureFlags,
    pub cache_urls: Option<&'a dyn CacheUrlResolver>,
}

impl<'a> ShellScriptInfo<'a> {
    pub fn new(job: &'a Job, runner: &'a RunnerConfig, build_dir: impl Into<String>) -> Self {
        let build_dir = build_dir.into();
        Self {
            job,
            runner,
            temp_dir: format!("{}.tmp", build_dir.trim_end_matches('/')),
            cache_dir: runner.cache_dir.clone().unwrap_or_else(|| "cache".to_string()),
            build_dir,
            hostname: String::new(),
            runner_command: runner
                .helper_command
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_HELPER_COMMAND.to_string()),
            flags: runner.feature_flags.resolve(&job.variables),
            cache_urls: None,
        }
    }

    /// `CI_DEBUG_TRACE` requests command echoing.
    pub fn trace(&self) -> bool {
        self.job.variables.bool("CI_DEBUG_TRACE").unwrap_or(false)
    }

    pub fn server_url(&self) -> &str {
        self.job.variables.value("CI_SERVER_URL")
    }

    /// Remote used by git, honoring the runner's clone URL override.
    pub fn remote_url(&self) -> String {
        let Some(base) = self.runner.clone_url.as_deref().filter(|u| !u.is_empty()) else {
            return self.job.git.repo_url.clone();
        };
        let (scheme, host) = base.split_once("://").unwrap_or(("https", base));
        format!(
            "{scheme}://gitlab-ci-token:{}@{}/{}.git",
            self.job.token,
            host.trim_end_matches('/'),
            self.job.project_path()
        )
    }
}
