use gantry_model::Artifact;

use super::{StageOutcome, write_exports, write_guarded};
use crate::{ShellScriptInfo, ShellWriter};

pub(super) fn write_download(w: &mut dyn ShellWriter, info: &ShellScriptInfo<'_>) -> StageOutcome {
    let deps: Vec<_> = info
        .job
        .dependencies
        .iter()
        .filter(|d| d.artifacts_file.is_some())
        .collect();
    if deps.is_empty() {
        return StageOutcome::Skipped;
    }

    write_exports(w, info);
    w.cd(&info.build_dir);

    for dep in deps {
        let id = dep.id.to_string();
        let args = [
            "artifacts-downloader",
            "--url",
            info.server_url(),
            "--token",
            &dep.token,
            "--id",
            &id,
        ];
        w.notice(&format!("Downloading artifacts for {} ({id})...", dep.name));
        write_guarded(
            w,
            info,
            &args,
            &format!("Downloaded artifacts for {}", dep.name),
            &format!("Failed to download artifacts for {}", dep.name),
            &format!("Missing {}. Artifacts downloading is disabled.", info.runner_command),
        );
    }
    StageOutcome::Written
}

/// Upload artifacts whose `when` matches the job outcome.
pub(super) fn write_upload(
    w: &mut dyn ShellWriter,
    info: &ShellScriptInfo<'_>,
    job_succeeded: bool,
) -> StageOutcome {
    let artifacts: Vec<&Artifact> = info
        .job
        .artifacts
        .iter()
        .filter(|a| a.when.applies(job_succeeded))
        .filter(|a| a.untracked || !a.paths.is_empty())
        .collect();
    if artifacts.is_empty() {
        return StageOutcome::Skipped;
    }

    write_exports(w, info);
    w.cd(&info.build_dir);

    let job = info.job;
    let id = job.id.to_string();
    for artifact in artifacts {
        let expand = |s: &str| job.variables.expand(s);
        let paths: Vec<String> = artifact.paths.iter().map(|p| expand(p)).collect();
        let excludes: Vec<String> = artifact.exclude.iter().map(|p| expand(p)).collect();
        let name = expand(&artifact.name);

        let mut args = vec![
            "artifacts-uploader",
            "--url",
            info.server_url(),
            "--token",
            &job.token,
            "--id",
            &id,
        ];
        for path in &paths {
            args.extend(["--path", path.as_str()]);
        }
        for exclude in &excludes {
            args.extend(["--exclude", exclude.as_str()]);
        }
        if artifact.untracked {
            args.push("--untracked");
        }
        for (flag, value) in [
            ("--name", name.as_str()),
            ("--expire-in", artifact.expire_in.as_str()),
            ("--artifact-format", artifact.format.as_str()),
            ("--artifact-type", artifact.artifact_type.as_str()),
        ] {
            if !value.is_empty() {
                args.extend([flag, value]);
            }
        }

        w.notice("Uploading artifacts...");
        write_guarded(
            w,
            info,
            &args,
            "Uploaded artifacts",
            "Failed to upload artifacts",
            &format!("Missing {}. Uploading artifacts is disabled.", info.runner_command),
        );
    }
    StageOutcome::Written
}

#[cfg(test)]
mod tests {
    use gantry_model::{
        Artifact, BuildStage, Dependency, DependencyArtifactsFile, Job, JobVariable, RunnerConfig,
        When,
    };

    use super::super::testing::{bash, info, structured};
    use crate::structured::{Condition, Instruction};

    fn artifact(path: &str, when: When) -> Artifact {
        Artifact {
            paths: vec![path.into()],
            when,
            ..Default::default()
        }
    }

    /// Argument lists of every `artifacts-uploader` invocation.
    fn uploads(instructions: &[Instruction], out: &mut Vec<Vec<String>>) {
        for i in instructions {
            if let Instruction::If {
                condition,
                then,
                otherwise,
            } = i
            {
                if let Condition::CommandSucceeds { args, .. } = condition {
                    if args.first().is_some_and(|a| a == "artifacts-uploader") {
                        out.push(args.clone());
                    }
                }
                uploads(then, out);
                uploads(otherwise, out);
            }
        }
    }

    fn paths_of(args: &[String]) -> Vec<&str> {
        args.windows(2)
            .filter(|w| w[0] == "--path")
            .map(|w| w[1].as_str())
            .collect()
    }

    #[test]
    fn on_success_selects_success_always_and_default() {
        let job = Job {
            id: 5,
            token: "job-token".into(),
            artifacts: vec![
                artifact("success/", When::OnSuccess),
                artifact("failure/", When::OnFailure),
                artifact("always/", When::Always),
                Artifact {
                    paths: vec!["default/".into()],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let runner = RunnerConfig::default();

        let mut found = Vec::new();
        uploads(
            &structured(BuildStage::UploadArtifactsOnSuccess, &info(&job, &runner)).instructions,
            &mut found,
        );
        let paths: Vec<Vec<&str>> = found.iter().map(|a| paths_of(a)).collect();
        assert_eq!(paths, vec![vec!["success/"], vec!["always/"], vec!["default/"]]);

        let mut found = Vec::new();
        uploads(
            &structured(BuildStage::UploadArtifactsOnFailure, &info(&job, &runner)).instructions,
            &mut found,
        );
        let paths: Vec<Vec<&str>> = found.iter().map(|a| paths_of(a)).collect();
        assert_eq!(paths, vec![vec!["failure/"], vec!["always/"]]);
    }

    #[test]
    fn uploader_flags() {
        let job = Job {
            id: 5,
            token: "job-token".into(),
            artifacts: vec![Artifact {
                name: "report-$CI_JOB_ID".into(),
                paths: vec!["out/".into()],
                exclude: vec!["out/*.tmp".into()],
                artifact_type: "junit".into(),
                format: "gzip".into(),
                expire_in: "1 week".into(),
                ..Default::default()
            }],
            variables: [
                JobVariable::new("CI_JOB_ID", "5"),
                JobVariable::new("CI_SERVER_URL", "https://gitlab.example.com"),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let runner = RunnerConfig::default();
        let script = bash(BuildStage::UploadArtifactsOnSuccess, &info(&job, &runner)).unwrap();
        assert!(script.contains(
            "gantry-helper artifacts-uploader --url 'https://gitlab.example.com' --token job-token --id 5 \
             --path out/ --exclude 'out/*.tmp' --name report-5 --expire-in '1 week' \
             --artifact-format gzip --artifact-type junit"
        ));
        assert!(script.contains("Missing gantry-helper. Uploading artifacts is disabled."));
    }

    #[test]
    fn nothing_to_upload_skips() {
        let job = Job {
            artifacts: vec![artifact("failure/", When::OnFailure), Artifact::default()],
            ..Default::default()
        };
        let runner = RunnerConfig::default();
        assert!(bash(BuildStage::UploadArtifactsOnSuccess, &info(&job, &runner)).is_none());
    }

    #[test]
    fn downloads_only_dependencies_with_artifacts() {
        let job = Job {
            dependencies: vec![
                Dependency {
                    id: 3,
                    token: "dep-token".into(),
                    name: "compile".into(),
                    artifacts_file: Some(DependencyArtifactsFile {
                        filename: "artifacts.zip".into(),
                        size: 10,
                    }),
                },
                Dependency {
                    id: 4,
                    token: "other".into(),
                    name: "lint".into(),
                    artifacts_file: None,
                },
            ],
            ..Default::default()
        };
        let runner = RunnerConfig::default();
        let script = bash(BuildStage::DownloadDependencies, &info(&job, &runner)).unwrap();
        assert!(script.contains("Downloading artifacts for compile (3)..."));
        assert!(script.contains("artifacts-downloader --url '' --token dep-token --id 3; then"));
        assert!(!script.contains("lint"));

        let none = Job::default();
        assert!(bash(BuildStage::DownloadDependencies, &info(&none, &runner)).is_none());
    }
}
