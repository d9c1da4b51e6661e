use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefType {
    #[default]
    Branch,
    Tag,
}

/// Repository coordinates of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitInfo {
    #[serde(default)]
    pub repo_url: String,
    #[serde(default, rename = "ref")]
    pub ref_name: String,
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub before_sha: String,
    #[serde(default)]
    pub ref_type: RefType,
    #[serde(default)]
    pub refspecs: Vec<String>,
    #[serde(default)]
    pub depth: u32,
}

impl GitInfo {
    /// Declared refspecs, or the single refspec covering the job's ref.
    pub fn effective_refspecs(&self) -> Vec<String> {
        if !self.refspecs.is_empty() {
            return self.refspecs.clone();
        }
        match self.ref_type {
            RefType::Branch => vec![format!(
                "+refs/heads/{0}:refs/remotes/origin/{0}",
                self.ref_name
            )],
            RefType::Tag => vec![format!("+refs/tags/{0}:refs/tags/{0}", self.ref_name)],
        }
    }

    /// First eight characters of the commit SHA.
    pub fn short_sha(&self) -> &str {
        self.sha.get(..8).unwrap_or(&self.sha)
    }
}

/// How sources are positioned before the script runs (`GIT_STRATEGY`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitStrategy {
    /// Re-use the existing working tree.
    Fetch,
    /// Remove the working tree, then fetch into a fresh one.
    Clone,
    /// Leave sources alone; only make sure the directory exists.
    None,
}

impl FromStr for GitStrategy {
    type Err = ModelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fetch" => Ok(Self::Fetch),
            "clone" => Ok(Self::Clone),
            "none" => Ok(Self::None),
            _ => Err(ModelError::UnknownGitStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for GitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fetch => "fetch",
            Self::Clone => "clone",
            Self::None => "none",
        })
    }
}

/// `GIT_SUBMODULE_STRATEGY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmoduleStrategy {
    None,
    Normal,
    Recursive,
}

impl FromStr for SubmoduleStrategy {
    type Err = ModelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "normal" => Ok(Self::Normal),
            "recursive" => Ok(Self::Recursive),
            _ => Err(ModelError::UnknownSubmoduleStrategy(s.to_string())),
        }
    }
}
