use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ModelError, When};

/// Whether a cache entry is downloaded, uploaded, or both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    #[default]
    PullPush,
    Pull,
    Push,
}

impl CachePolicy {
    pub fn should_pull(&self) -> bool {
        matches!(self, CachePolicy::PullPush | CachePolicy::Pull)
    }

    pub fn should_push(&self) -> bool {
        matches!(self, CachePolicy::PullPush | CachePolicy::Push)
    }
}

impl FromStr for CachePolicy {
    type Err = ModelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "pull-push" => Ok(Self::PullPush),
            "pull" => Ok(Self::Pull),
            "push" => Ok(Self::Push),
            _ => Err(ModelError::UnknownCachePolicy(s.to_string())),
        }
    }
}

/// Declared cache entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Key template; may reference job variables.
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub untracked: bool,
    #[serde(default)]
    pub policy: CachePolicy,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub when: When,
}
