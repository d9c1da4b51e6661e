use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyArtifactsFile {
    pub filename: String,
    #[serde(default)]
    pub size: u64,
}

/// Another job whose artifacts this job downloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: u64,
    pub token: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts_file: Option<DependencyArtifactsFile>,
}
