use std::path::Path;

use gantry_model::CacheEntry;

use super::{StageOutcome, write_exports, write_guarded};
use crate::{ShellScriptInfo, ShellWriter};

const DEFAULT_CACHE_REQUEST_TIMEOUT: u32 = 10;

pub(super) fn write_restore(w: &mut dyn ShellWriter, info: &ShellScriptInfo<'_>) -> StageOutcome {
    let job = info.job;
    if job.cache.is_empty() {
        return StageOutcome::Skipped;
    }

    write_exports(w, info);
    w.cd(&info.build_dir);

    for entry in &job.cache {
        let Some(key) = cache_key(w, info, entry, "extraction") else {
            continue;
        };
        if !entry.policy.should_pull() {
            w.notice(&format!("Not downloading cache {key} due to policy"));
            continue;
        }

        let file = cache_file(info, &key);
        let timeout = request_timeout(info);
        let mut args = vec!["cache-extractor", "--file", &file, "--timeout", &timeout];
        let url = info.cache_urls.and_then(|r| r.download_url(&key));
        if let Some(url) = url.as_deref() {
            args.extend(["--url", url]);
        }

        w.notice(&format!("Checking cache for {key}..."));
        write_guarded(
            w,
            info,
            &args,
            &format!("Successfully extracted cache {key}"),
            &format!("Failed to extract cache {key}"),
            &format!("Missing {}. Extracting cache is disabled.", info.runner_command),
        );
    }
    StageOutcome::Written
}

/// Archive cache entries whose `when` matches the job outcome.
pub(super) fn write_archive(
    w: &mut dyn ShellWriter,
    info: &ShellScriptInfo<'_>,
    job_succeeded: bool,
) -> StageOutcome {
    let entries: Vec<&CacheEntry> = info
        .job
        .cache
        .iter()
        .filter(|e| e.when.applies(job_succeeded))
        .collect();
    if entries.is_empty() {
        return StageOutcome::Skipped;
    }

    write_exports(w, info);
    w.cd(&info.build_dir);

    for entry in entries {
        let Some(key) = cache_key(w, info, entry, "archiving") else {
            continue;
        };
        if !entry.policy.should_push() {
            w.notice(&format!("Not uploading cache {key} due to policy"));
            continue;
        }

        let file = cache_file(info, &key);
        let timeout = request_timeout(info);
        let paths: Vec<String> = entry
            .paths
            .iter()
            .map(|p| info.job.variables.expand(p))
            .collect();

        let mut args = vec!["cache-archiver", "--file", &file, "--timeout", &timeout];
        for path in &paths {
            args.extend(["--path", path.as_str()]);
        }
        if entry.untracked {
            args.push("--untracked");
        }
        let url = info.cache_urls.and_then(|r| r.upload_url(&key));
        if let Some(url) = url.as_deref() {
            args.extend(["--url", url]);
        }

        w.notice(&format!("Creating cache {key}..."));
        write_guarded(
            w,
            info,
            &args,
            &format!("Created cache {key}"),
            &format!("Failed to create cache {key}"),
            &format!("Missing {}. Creating cache is disabled.", info.runner_command),
        );
    }
    StageOutcome::Written
}

/// Expanded cache key, or `None` (with a message) when it cannot be used.
///
/// An undeclared key defaults to `<job name>/<ref>`.
fn cache_key(
    w: &mut dyn ShellWriter,
    info: &ShellScriptInfo<'_>,
    entry: &CacheEntry,
    action: &str,
) -> Option<String> {
    let job = info.job;
    let template = if entry.key.is_empty() {
        format!("{}/{}", job.name, job.git.ref_name)
    } else {
        entry.key.clone()
    };

    let key = job.variables.expand(&template);
    let key = key.trim().trim_matches('/');
    if key.is_empty() {
        w.notice(&format!("Skipping cache {action} due to empty cache key"));
        return None;
    }
    if key.split(['/', '\\']).any(|segment| segment == "..") {
        w.warning(&format!("Skipping cache {action}: key {key:?} escapes the cache directory"));
        return None;
    }
    Some(key.to_string())
}

/// Archive location, relative to the build directory when nested in it.
fn cache_file(info: &ShellScriptInfo<'_>, key: &str) -> String {
    let file = Path::new(&info.cache_dir).join(key).join("cache.zip");
    match file.strip_prefix(&info.build_dir) {
        Ok(relative) => relative.to_string_lossy().into_owned(),
        Err(_) => file.to_string_lossy().into_owned(),
    }
}

fn request_timeout(info: &ShellScriptInfo<'_>) -> String {
    info.job
        .variables
        .get("CACHE_REQUEST_TIMEOUT")
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|t| *t > 0)
        .unwrap_or(DEFAULT_CACHE_REQUEST_TIMEOUT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use gantry_model::{BuildStage, CacheEntry, CachePolicy, GitInfo, Job, JobVariable, RunnerConfig, When};

    use super::super::testing::{bash, info, structured};
    use crate::CacheUrlResolver;
    use crate::structured::{Condition, Instruction};

    fn job(cache: Vec<CacheEntry>, vars: &[(&str, &str)]) -> Job {
        Job {
            name: "build".into(),
            git: GitInfo {
                ref_name: "main".into(),
                ..Default::default()
            },
            cache,
            variables: vars.iter().map(|(k, v)| JobVariable::new(*k, *v)).collect(),
            ..Default::default()
        }
    }

    fn entry(key: &str) -> CacheEntry {
        CacheEntry {
            key: key.into(),
            paths: vec!["vendor/".into()],
            ..Default::default()
        }
    }

    fn invokes(instructions: &[Instruction], subcommand: &str) -> bool {
        instructions.iter().any(|i| match i {
            Instruction::Cmd { args, .. } => args.first().is_some_and(|a| a == subcommand),
            Instruction::If {
                condition,
                then,
                otherwise,
            } => {
                matches!(condition, Condition::CommandSucceeds { args, .. } if args.first().is_some_and(|a| a == subcommand))
                    || invokes(then, subcommand)
                    || invokes(otherwise, subcommand)
            }
            _ => false,
        })
    }

    #[test]
    fn no_cache_entries_skip_the_stage() {
        let job = job(vec![], &[]);
        let runner = RunnerConfig::default();
        assert!(bash(BuildStage::RestoreCache, &info(&job, &runner)).is_none());
        assert!(bash(BuildStage::ArchiveCache, &info(&job, &runner)).is_none());
    }

    #[test]
    fn key_expanding_to_empty_skips_extraction() {
        let job = job(vec![entry("$UNDEFINED_KEY")], &[]);
        let runner = RunnerConfig::default();
        let script = structured(BuildStage::RestoreCache, &info(&job, &runner));

        assert!(script.instructions.iter().any(|i| matches!(
            i,
            Instruction::Print { text, .. } if text == "Skipping cache extraction due to empty cache key"
        )));
        assert!(!invokes(&script.instructions, "cache-extractor"));
    }

    #[test]
    fn empty_declared_key_defaults_to_job_and_ref() {
        let job = job(vec![entry("")], &[]);
        let runner = RunnerConfig::default();
        let script = bash(BuildStage::RestoreCache, &info(&job, &runner)).unwrap();
        assert!(script.contains("Checking cache for build/main..."));
        assert!(script.contains(
            "if gantry-helper cache-extractor --file /cache/build/main/cache.zip --timeout 10; then"
        ));
        assert!(script.contains("Missing gantry-helper. Extracting cache is disabled."));
    }

    #[test]
    fn archive_respects_policy_and_when() {
        let mut pull_only = entry("deps");
        pull_only.policy = CachePolicy::Pull;
        let mut on_failure = entry("failure-$CI_JOB_ID");
        on_failure.when = When::OnFailure;
        on_failure.untracked = true;
        let job = job(vec![pull_only, on_failure], &[("CI_JOB_ID", "77"), ("CACHE_REQUEST_TIMEOUT", "3")]);
        let runner = RunnerConfig::default();

        let success = bash(BuildStage::ArchiveCache, &info(&job, &runner)).unwrap();
        assert!(success.contains("Not uploading cache deps due to policy"));
        assert!(!success.contains("cache-archiver"));

        let failure = bash(BuildStage::ArchiveCacheOnFailure, &info(&job, &runner)).unwrap();
        assert!(failure.contains(
            "gantry-helper cache-archiver --file /cache/failure-77/cache.zip --timeout 3 --path vendor/ --untracked"
        ));
        assert!(!failure.contains("deps"));
    }

    #[test]
    fn traversal_keys_are_rejected() {
        let job = job(vec![entry("../../etc")], &[]);
        let runner = RunnerConfig::default();
        let script = bash(BuildStage::RestoreCache, &info(&job, &runner)).unwrap();
        assert!(script.contains("escapes the cache directory"));
        assert!(!script.contains("cache-extractor"));
    }

    struct Urls;

    impl CacheUrlResolver for Urls {
        fn download_url(&self, key: &str) -> Option<String> {
            Some(format!("https://cache.example.com/{key}?sig=get"))
        }
        fn upload_url(&self, _key: &str) -> Option<String> {
            None
        }
    }

    #[test]
    fn presigned_urls_and_relative_paths() {
        let job = job(vec![entry("deps")], &[]);
        let runner = RunnerConfig::default();
        let mut info = info(&job, &runner);
        info.cache_dir = format!("{}/.cache", info.build_dir);
        info.cache_urls = Some(&Urls);

        let script = bash(BuildStage::RestoreCache, &info).unwrap();
        assert!(script.contains(
            "cache-extractor --file .cache/deps/cache.zip --timeout 10 --url 'https://cache.example.com/deps?sig=get'"
        ));
    }
}
