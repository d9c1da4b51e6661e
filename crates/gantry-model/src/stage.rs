use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// A generated-script phase of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStage {
    Prepare,
    GetSources,
    RestoreCache,
    DownloadDependencies,
    UserScript,
    AfterScript,
    ArchiveCache,
    ArchiveCacheOnFailure,
    UploadArtifactsOnSuccess,
    UploadArtifactsOnFailure,
    CleanupFileVariables,
}

impl BuildStage {
    pub const ALL: [BuildStage; 11] = [
        BuildStage::Prepare,
        BuildStage::GetSources,
        BuildStage::RestoreCache,
        BuildStage::DownloadDependencies,
        BuildStage::UserScript,
        BuildStage::AfterScript,
        BuildStage::ArchiveCache,
        BuildStage::ArchiveCacheOnFailure,
        BuildStage::UploadArtifactsOnSuccess,
        BuildStage::UploadArtifactsOnFailure,
        BuildStage::CleanupFileVariables,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStage::Prepare => "prepare",
            BuildStage::GetSources => "get-sources",
            BuildStage::RestoreCache => "restore-cache",
            BuildStage::DownloadDependencies => "download-dependencies",
            BuildStage::UserScript => "user-script",
            BuildStage::AfterScript => "after-script",
            BuildStage::ArchiveCache => "archive-cache",
            BuildStage::ArchiveCacheOnFailure => "archive-cache-on-failure",
            BuildStage::UploadArtifactsOnSuccess => "upload-artifacts-on-success",
            BuildStage::UploadArtifactsOnFailure => "upload-artifacts-on-failure",
            BuildStage::CleanupFileVariables => "cleanup-file-variables",
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildStage {
    type Err = ModelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildStage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| ModelError::UnknownStage(s.to_string()))
    }
}

/// Lifecycle position of an executor, for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "stage")]
pub enum ExecutorStage {
    #[default]
    Created,
    Preparing,
    Prepared,
    Running(BuildStage),
    Finishing,
    Finished,
    CleaningUp,
    CleanedUp,
}

impl fmt::Display for ExecutorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorStage::Created => f.write_str("created"),
            ExecutorStage::Preparing => f.write_str("preparing"),
            ExecutorStage::Prepared => f.write_str("prepared"),
            ExecutorStage::Running(stage) => write!(f, "running:{stage}"),
            ExecutorStage::Finishing => f.write_str("finishing"),
            ExecutorStage::Finished => f.write_str("finished"),
            ExecutorStage::CleaningUp => f.write_str("cleaning_up"),
            ExecutorStage::CleanedUp => f.write_str("cleaned_up"),
        }
    }
}
