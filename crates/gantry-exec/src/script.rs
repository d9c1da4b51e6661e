use std::{
    io,
    path::PathBuf,
};

use tracing::{trace, warn};

use gantry_model::{BuildStage, Job, RunnerConfig};

/// Local directory holding the rendered stage scripts of one job.
#[derive(Debug, Clone)]
pub(crate) struct ScriptDir {
    path: PathBuf,
}

impl ScriptDir {
    pub(crate) fn for_job(job: &Job, config: &RunnerConfig) -> Self {
        let name = format!("gantry-{}-{}", config.short_token(), job.id);
        Self {
            path: std::env::temp_dir().join(name),
        }
    }

    /// Write `script` for `stage` and return its path.
    pub(crate) async fn write(
        &self,
        stage: BuildStage,
        extension: &str,
        script: &str,
    ) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.path).await?;
        let file = self.path.join(format!("{stage}.{extension}"));
        tokio::fs::write(&file, script).await?;
        trace!(path = %file.display(), "stage script written");
        Ok(file)
    }

    pub(crate) async fn remove(&self) {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove scripts"),
        }
    }
}
