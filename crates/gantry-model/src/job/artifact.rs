use serde::{Deserialize, Serialize};

/// Condition under which an artifact or cache entry is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum When {
    #[default]
    OnSuccess,
    OnFailure,
    Always,
}

impl When {
    /// Whether this entry applies to a job that ended with the given outcome.
    pub fn applies(&self, job_succeeded: bool) -> bool {
        match self {
            When::OnSuccess => job_succeeded,
            When::OnFailure => !job_succeeded,
            When::Always => true,
        }
    }
}

/// Declared artifact upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub untracked: bool,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub when: When,
    /// Artifact type, e.g. `archive` or `junit`.
    #[serde(default)]
    pub artifact_type: String,
    /// Archive format, e.g. `zip` or `gzip`.
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub expire_in: String,
}
