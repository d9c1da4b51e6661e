use std::path::{Path, PathBuf};

use gantry_model::{Job, RunnerConfig};

/// Where a job's sources and cache live.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPaths {
    pub build_dir: String,
    pub cache_dir: String,
    pub hostname: String,
}

impl BuildPaths {
    /// Resolve the configured directories against `cwd`.
    ///
    /// Relative or missing `builds_dir`/`cache_dir` land under `cwd`
    /// (`builds`, `cache` by default); the build directory gets the
    /// project path appended.
    pub fn resolve(config: &RunnerConfig, job: &Job, cwd: &Path) -> Self {
        let base = |dir: Option<&str>, default: &str| -> PathBuf {
            let dir = Path::new(dir.filter(|d| !d.is_empty()).unwrap_or(default));
            if dir.is_absolute() {
                dir.to_path_buf()
            } else {
                cwd.join(dir)
            }
        };
        let build_dir = base(config.builds_dir.as_deref(), "builds").join(job.project_path());
        let cache_dir = base(config.cache_dir.as_deref(), "cache");
        Self {
            build_dir: build_dir.to_string_lossy().into_owned(),
            cache_dir: cache_dir.to_string_lossy().into_owned(),
            hostname: String::new(),
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }
}
