//! Shell-agnostic stage generation.
//!
//! Each stage inspects the job first and either returns
//! [`StageOutcome::Skipped`] without touching the writer, or writes the
//! complete stage. A generator error leaves the writer in an unspecified
//! state; callers discard it.
mod artifacts;
mod cache;
mod script;
mod sources;

use gantry_model::{BuildStage, Env};
use tracing::trace;

use crate::{ShellResult, ShellScriptInfo, ShellWriter};

/// Whether a stage produced anything to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Written,
    Skipped,
}

/// Write `stage` for `info` into `w`.
pub fn generate_stage(
    w: &mut dyn ShellWriter,
    stage: BuildStage,
    info: &ShellScriptInfo<'_>,
) -> ShellResult<StageOutcome> {
    trace!(job = info.job.id, %stage, "generating stage");
    match stage {
        BuildStage::Prepare => {
            write_prepare(w, info);
            Ok(StageOutcome::Written)
        }
        BuildStage::GetSources => sources::write_get_sources(w, info),
        BuildStage::RestoreCache => Ok(cache::write_restore(w, info)),
        BuildStage::DownloadDependencies => Ok(artifacts::write_download(w, info)),
        BuildStage::UserScript => Ok(script::write_user_script(w, info)),
        BuildStage::AfterScript => Ok(script::write_after_script(w, info)),
        BuildStage::ArchiveCache => Ok(cache::write_archive(w, info, true)),
        BuildStage::ArchiveCacheOnFailure => Ok(cache::write_archive(w, info, false)),
        BuildStage::UploadArtifactsOnSuccess => Ok(artifacts::write_upload(w, info, true)),
        BuildStage::UploadArtifactsOnFailure => Ok(artifacts::write_upload(w, info, false)),
        BuildStage::CleanupFileVariables => {
            write_cleanup(w, info);
            Ok(StageOutcome::Written)
        }
    }
}

/// Like [`generate_stage`], for a stage given by name.
pub fn generate_stage_named(
    w: &mut dyn ShellWriter,
    stage: &str,
    info: &ShellScriptInfo<'_>,
) -> ShellResult<StageOutcome> {
    let stage = stage
        .parse::<BuildStage>()
        .map_err(|_| crate::ShellError::UnknownStage(stage.to_string()))?;
    generate_stage(w, stage, info)
}

fn write_prepare(w: &mut dyn ShellWriter, info: &ShellScriptInfo<'_>) {
    if info.hostname.is_empty() {
        w.notice("Running on runner host...");
    } else {
        w.notice(&format!("Running on {}...", info.hostname));
    }
}

fn write_cleanup(w: &mut dyn ShellWriter, info: &ShellScriptInfo<'_>) {
    w.rm_dir(&info.temp_dir);
    if info.flags.enable_job_cleanup {
        w.rm_dir(&info.build_dir);
    }
}

/// Export job variables and runner environment.
pub(crate) fn write_exports(w: &mut dyn ShellWriter, info: &ShellScriptInfo<'_>) {
    let vars: Vec<_> = info.job.variables.public().collect();
    if vars.iter().any(|v| v.file) {
        w.mkdir(&info.temp_dir);
    }
    for var in vars {
        if var.file {
            let path = w.tmp_file(&var.key);
            w.file_variable(&var.key, &var.value, &path);
        } else {
            w.variable(&var.key, &var.value);
        }
    }
    let env = Env::from_lines(info.runner.environment.iter().map(String::as_str));
    for kv in env.iter() {
        w.variable(kv.key(), kv.value());
    }
}

/// Run a helper subcommand, degrading to a warning when it is missing or fails.
pub(crate) fn write_guarded(
    w: &mut dyn ShellWriter,
    info: &ShellScriptInfo<'_>,
    args: &[&str],
    succeeded: &str,
    failed: &str,
    missing: &str,
) {
    w.if_cmd(&info.runner_command, &["--version"]);
    w.if_cmd_with_output(&info.runner_command, args);
    w.notice(succeeded);
    w.else_();
    w.warning(failed);
    w.end_if();
    w.else_();
    w.warning(missing);
    w.end_if();
}
