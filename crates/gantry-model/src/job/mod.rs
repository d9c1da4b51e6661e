//! Job description as delivered by the dispatcher.
//!
//! A [`Job`] is immutable once execution begins; runtime-computed values
//! (build directory, hostname) live next to it in executor state.
mod git;
pub use git::{GitInfo, GitStrategy, RefType, SubmoduleStrategy};

mod artifact;
pub use artifact::{Artifact, When};

mod cache;
pub use cache::{CacheEntry, CachePolicy};

mod dependency;
pub use dependency::{Dependency, DependencyArtifactsFile};

use serde::{Deserialize, Serialize};

use crate::{ModelResult, Variables};

/// Default job timeout when the dispatcher does not send one.
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 3600;

/// Name of a script step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Script,
    AfterScript,
    #[serde(other)]
    Other,
}

/// A named list of script lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: StepName,
    #[serde(default)]
    pub script: Vec<String>,
    /// Step-specific timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
    #[serde(default)]
    pub allow_failure: bool,
}

/// One unit of work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub token: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub git: GitInfo,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub cache: Vec<CacheEntry>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub variables: Variables,
    /// Image requested by the job, used by VM-isolated instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Overall job timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
}

impl Job {
    pub fn step(&self, name: StepName) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// `GIT_STRATEGY`, defaulting to `fetch`.
    pub fn git_strategy(&self) -> ModelResult<GitStrategy> {
        match self.variables.get("GIT_STRATEGY") {
            Some(s) if !s.is_empty() => s.parse(),
            _ => Ok(GitStrategy::Fetch),
        }
    }

    /// `GIT_SUBMODULE_STRATEGY`, defaulting to `none`.
    pub fn submodule_strategy(&self) -> ModelResult<SubmoduleStrategy> {
        match self.variables.get("GIT_SUBMODULE_STRATEGY") {
            Some(s) if !s.is_empty() => s.parse(),
            _ => Ok(SubmoduleStrategy::None),
        }
    }

    /// `GIT_DEPTH` when it parses, otherwise the depth sent with the git info.
    pub fn git_depth(&self) -> u32 {
        self.variables
            .get("GIT_DEPTH")
            .and_then(|d| d.trim().parse().ok())
            .unwrap_or(self.git.depth)
    }

    /// `GIT_CHECKOUT`, enabled unless explicitly disabled.
    pub fn git_checkout(&self) -> bool {
        self.variables.bool("GIT_CHECKOUT").unwrap_or(true)
    }

    /// Arguments appended to `git clean`.
    pub fn git_clean_flags(&self) -> Vec<String> {
        match self.variables.get("GIT_CLEAN_FLAGS") {
            Some(flags) if flags.trim() == "none" => Vec::new(),
            Some(flags) if !flags.trim().is_empty() => {
                flags.split_whitespace().map(str::to_string).collect()
            }
            _ => vec!["-ffdx".to_string()],
        }
    }

    /// LFS smudging was explicitly disabled for this job.
    pub fn lfs_smudge_disabled(&self) -> bool {
        self.variables.bool("GIT_LFS_SKIP_SMUDGE").unwrap_or(false)
    }

    /// Project path (`group/project`) used for per-project directories.
    ///
    /// Prefers `CI_PROJECT_PATH`; falls back to the repository URL path.
    pub fn project_path(&self) -> String {
        if let Some(path) = self.variables.get("CI_PROJECT_PATH").filter(|p| !p.is_empty()) {
            return path.trim_matches('/').to_string();
        }
        let url = self.git.repo_url.as_str();
        let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
        let path = without_scheme
            .split_once('/')
            .map_or("", |(_, path)| path)
            .trim_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        if path.is_empty() {
            format!("project-{}", self.id)
        } else {
            path.to_string()
        }
    }

    pub fn timeout_secs(&self) -> u64 {
        match self.timeout {
            Some(t) if t > 0 => t as u64,
            _ => DEFAULT_JOB_TIMEOUT_SECS,
        }
    }
}
