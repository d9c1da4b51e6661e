use gantry_model::{GitStrategy, SubmoduleStrategy};

use super::{StageOutcome, write_exports};
use crate::{ShellResult, ShellScriptInfo, ShellWriter};

/// Leftovers of an interrupted git process that block the next one.
const STALE_GIT_FILES: [&str; 4] = ["index.lock", "shallow.lock", "HEAD.lock", "hooks/post-checkout"];

const TLS_VARIABLES: [(&str, &str); 3] = [
    ("CI_SERVER_TLS_CA_FILE", "sslCAInfo"),
    ("CI_SERVER_TLS_CERT_FILE", "sslCert"),
    ("CI_SERVER_TLS_KEY_FILE", "sslKey"),
];

pub(super) fn write_get_sources(
    w: &mut dyn ShellWriter,
    info: &ShellScriptInfo<'_>,
) -> ShellResult<StageOutcome> {
    let job = info.job;
    let strategy = job.git_strategy()?;
    let submodules = job.submodule_strategy()?;

    write_exports(w, info);
    if !info.runner.shared {
        write_git_tls_config(w, info);
    }

    if strategy != GitStrategy::None {
        if let Some(script) = info.runner.pre_clone_script.as_deref() {
            for line in script.lines().filter(|l| !l.trim().is_empty()) {
                w.line(line);
                w.check_for_errors();
            }
        }
    }

    match strategy {
        GitStrategy::Fetch => write_fetch(w, info),
        GitStrategy::Clone => {
            w.rm_dir(&info.build_dir);
            write_fetch(w, info);
        }
        GitStrategy::None => {
            w.notice("Skipping Git repository setup");
            w.mkdir(&info.build_dir);
            return Ok(StageOutcome::Written);
        }
    }

    if !job.git_checkout() {
        w.notice("Skipping Git checkout");
        return Ok(StageOutcome::Written);
    }

    write_checkout(w, info);
    write_lfs_pull(w, info, &["lfs", "pull"]);
    write_submodules(w, info, submodules);
    Ok(StageOutcome::Written)
}

fn write_git_tls_config(w: &mut dyn ShellWriter, info: &ShellScriptInfo<'_>) {
    let server = info.server_url().trim_end_matches('/');
    if server.is_empty() {
        return;
    }
    for (variable, setting) in TLS_VARIABLES {
        if info.job.variables.find(variable).is_none() {
            continue;
        }
        let key = format!("http.{server}.{setting}");
        let value = w.env_variable_key(variable);
        w.command_arg_expand("git", &["config", "--global", &key, &value]);
        w.check_for_errors();
    }
}

fn write_fetch(w: &mut dyn ShellWriter, info: &ShellScriptInfo<'_>) {
    let job = info.job;
    let dir = info.build_dir.as_str();
    let remote = info.remote_url();
    let depth = job.git_depth();

    if depth > 0 {
        w.notice(&format!("Fetching changes with git depth set to {depth}..."));
    } else {
        w.notice("Fetching changes...");
    }

    let template = w.tmp_file("git-template");
    w.mkdir(&template);
    w.command(
        "git",
        &["config", "-f", &format!("{template}/config"), "fetch.recurseSubmodules", "false"],
    );
    w.check_for_errors();

    for stale in STALE_GIT_FILES {
        w.rm_file(&format!("{dir}/.git/{stale}"));
    }

    w.if_directory(&format!("{dir}/.git"));
    w.notice(&format!("Reinitialized existing Git repository in {dir}/.git/"));
    w.cd(dir);
    w.command("git", &["remote", "set-url", "origin", &remote]);
    w.check_for_errors();
    w.else_();
    w.mkdir(dir);
    w.cd(dir);
    w.command("git", &["init", "--quiet", "--template", &template]);
    w.check_for_errors();
    w.notice("Created fresh repository.");
    w.command("git", &["remote", "add", "origin", &remote]);
    w.check_for_errors();
    w.end_if();

    let refspecs = job.git.effective_refspecs();
    let depth_arg = depth.to_string();
    let mut args = vec!["fetch", "origin"];
    args.extend(refspecs.iter().map(String::as_str));
    args.extend(["--prune", "--quiet"]);
    if depth > 0 {
        args.extend(["--depth", depth_arg.as_str()]);
    }
    w.command("git", &args);
    w.check_for_errors();
}

fn write_checkout(w: &mut dyn ShellWriter, info: &ShellScriptInfo<'_>) {
    let git = &info.job.git;
    w.notice(&format!("Checking out {} as {}...", git.short_sha(), git.ref_name));
    w.command("git", &["checkout", "-f", "-q", &git.sha]);
    w.check_for_errors();

    let flags = info.job.git_clean_flags();
    if !flags.is_empty() {
        let mut args = vec!["clean"];
        args.extend(flags.iter().map(String::as_str));
        w.command("git", &args);
        w.check_for_errors();
    }
}

fn write_lfs_pull(w: &mut dyn ShellWriter, info: &ShellScriptInfo<'_>, args: &[&str]) {
    if info.job.lfs_smudge_disabled() {
        return;
    }
    w.if_cmd("git-lfs", &["version"]);
    w.command("git", args);
    w.check_for_errors();
    w.empty_line();
    w.end_if();
}

fn write_submodules(w: &mut dyn ShellWriter, info: &ShellScriptInfo<'_>, strategy: SubmoduleStrategy) {
    let recursive = match strategy {
        SubmoduleStrategy::None => {
            w.notice("Skipping Git submodules setup");
            return;
        }
        SubmoduleStrategy::Normal => {
            w.notice("Updating/initializing submodules...");
            false
        }
        SubmoduleStrategy::Recursive => {
            w.notice("Updating/initializing submodules recursively...");
            true
        }
    };

    let submodule = |sub: &'static str, rest: &[&'static str]| -> Vec<&'static str> {
        let mut args = vec!["submodule", sub];
        if recursive {
            args.push("--recursive");
        }
        args.extend_from_slice(rest);
        args
    };

    for args in [
        submodule("sync", &[]),
        submodule("update", &["--init"]),
        submodule("foreach", &["git", "clean", "-ffxd"]),
        submodule("foreach", &["git", "reset", "--hard"]),
    ] {
        w.command("git", &args);
        w.check_for_errors();
    }
    write_lfs_pull(w, info, &submodule("foreach", &["git", "lfs", "pull"]));
}

#[cfg(test)]
mod tests {
    use std::{path::Path, process::Command};

    use gantry_model::{BuildStage, GitInfo, Job, JobVariable, RunnerConfig};

    use super::super::testing::{bash, info, structured};
    use crate::structured::{Condition, Instruction};
    use crate::{BashFlavor, BashWriter, ShellScriptInfo, ShellWriter, generate_stage};

    fn job(vars: &[(&str, &str)]) -> Job {
        Job {
            id: 1,
            token: "tok".into(),
            git: GitInfo {
                repo_url: "https://gitlab.example.com/group/project.git".into(),
                ref_name: "main".into(),
                sha: "0123456789abcdef0123".into(),
                ..Default::default()
            },
            variables: vars.iter().map(|(k, v)| JobVariable::new(*k, *v)).collect(),
            ..Default::default()
        }
    }

    fn mentions_git(instructions: &[Instruction]) -> bool {
        instructions.iter().any(|i| match i {
            Instruction::Cmd { cmd, .. } => cmd.starts_with("git"),
            Instruction::If {
                condition,
                then,
                otherwise,
            } => {
                matches!(condition, Condition::CommandSucceeds { cmd, .. } if cmd.starts_with("git"))
                    || mentions_git(then)
                    || mentions_git(otherwise)
            }
            _ => false,
        })
    }

    #[test]
    fn strategy_none_only_creates_directory() {
        let job = job(&[("GIT_STRATEGY", "none")]);
        let runner = RunnerConfig::default();
        let script = structured(BuildStage::GetSources, &info(&job, &runner));

        assert!(script.instructions.iter().any(|i| matches!(
            i,
            Instruction::Print { text, .. } if text == "Skipping Git repository setup"
        )));
        assert!(script.instructions.iter().any(|i| matches!(
            i,
            Instruction::Mkdir { path } if path == "/builds/group/project"
        )));
        assert!(!mentions_git(&script.instructions));
    }

    #[test]
    fn fetch_clears_locks_and_reuses_repository() {
        let job = job(&[("GIT_DEPTH", "20")]);
        let runner = RunnerConfig::default();
        let script = bash(BuildStage::GetSources, &info(&job, &runner)).unwrap();

        assert!(script.contains("Fetching changes with git depth set to 20..."));
        assert!(script.contains("rm -f /builds/group/project/.git/index.lock\n"));
        assert!(script.contains("rm -f /builds/group/project/.git/hooks/post-checkout\n"));
        assert!(script.contains("if [ -d /builds/group/project/.git ]; then"));
        assert!(script.contains(
            "git fetch origin '+refs/heads/main:refs/remotes/origin/main' --prune --quiet --depth 20\n"
        ));
        assert!(script.contains("Checking out 01234567 as main..."));
        assert!(script.contains("git checkout -f -q 0123456789abcdef0123\n"));
        assert!(script.contains("git clean -ffdx\n"));
        assert!(!script.contains("rm -r -f /builds/group/project\n"));
    }

    #[test]
    fn clone_removes_tree_first() {
        let job = job(&[("GIT_STRATEGY", "clone")]);
        let runner = RunnerConfig::default();
        let script = bash(BuildStage::GetSources, &info(&job, &runner)).unwrap();
        let rm = script.find("rm -r -f /builds/group/project\n").unwrap();
        let fetch = script.find("git fetch origin").unwrap();
        assert!(rm < fetch);
    }

    #[test]
    fn checkout_disabled_only_notices() {
        let job = job(&[("GIT_CHECKOUT", "false"), ("GIT_SUBMODULE_STRATEGY", "recursive")]);
        let runner = RunnerConfig::default();
        let script = bash(BuildStage::GetSources, &info(&job, &runner)).unwrap();
        assert!(script.contains("Skipping Git checkout"));
        assert!(!script.contains("git checkout"));
        assert!(!script.contains("git submodule"));
    }

    #[test]
    fn recursive_submodules_and_lfs() {
        let job = job(&[("GIT_SUBMODULE_STRATEGY", "recursive")]);
        let runner = RunnerConfig::default();
        let script = bash(BuildStage::GetSources, &info(&job, &runner)).unwrap();
        assert!(script.contains("git submodule sync --recursive\n"));
        assert!(script.contains("git submodule update --recursive --init\n"));
        assert!(script.contains("git submodule foreach --recursive git clean -ffxd\n"));
        assert!(script.contains("if git-lfs version >/dev/null 2>&1; then\n  git lfs pull\n"));
        assert!(script.contains("  git submodule foreach --recursive git lfs pull\n"));
    }

    #[test]
    fn lfs_skipped_when_smudge_disabled() {
        let job = job(&[("GIT_LFS_SKIP_SMUDGE", "1")]);
        let runner = RunnerConfig::default();
        let script = bash(BuildStage::GetSources, &info(&job, &runner)).unwrap();
        assert!(!script.contains("git-lfs"));
    }

    #[test]
    fn tls_config_only_outside_shared_environments() {
        let job = job(&[
            ("CI_SERVER_URL", "https://gitlab.example.com"),
            ("CI_SERVER_TLS_CA_FILE", "/certs/ca.crt"),
        ]);
        let mut runner = RunnerConfig::default();
        let script = bash(BuildStage::GetSources, &info(&job, &runner)).unwrap();
        assert!(script.contains(
            "git \"config\" \"--global\" \"http.https://gitlab.example.com.sslCAInfo\" \"$CI_SERVER_TLS_CA_FILE\"\n"
        ));
        assert!(!script.contains("sslCert"));

        runner.shared = true;
        let script = bash(BuildStage::GetSources, &info(&job, &runner)).unwrap();
        assert!(!script.contains("sslCAInfo"));
    }

    #[test]
    fn pre_clone_script_skipped_for_strategy_none() {
        let runner = RunnerConfig {
            pre_clone_script: Some("echo pre-clone".into()),
            ..Default::default()
        };
        let fetch = job(&[]);
        assert!(bash(BuildStage::GetSources, &info(&fetch, &runner))
            .unwrap()
            .contains("echo pre-clone\n"));

        let none = job(&[("GIT_STRATEGY", "none")]);
        assert!(!bash(BuildStage::GetSources, &info(&none, &runner))
            .unwrap()
            .contains("pre-clone"));
    }

    #[test]
    fn invalid_strategy_fails_generation() {
        let job = job(&[("GIT_STRATEGY", "rsync")]);
        let runner = RunnerConfig::default();
        let info = info(&job, &runner);
        let mut w = BashWriter::new(BashFlavor::Bash, "/tmp");
        assert!(generate_stage(&mut w, BuildStage::GetSources, &info).is_err());
    }

    fn git(dir: &Path, args: &[&str]) -> String {
        let out = Command::new("git")
            .args(["-c", "user.name=gantry", "-c", "user.email=gantry@example.com"])
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(out.status.success(), "git {args:?}: {}", String::from_utf8_lossy(&out.stderr));
        String::from_utf8_lossy(&out.stdout).trim().to_string()
    }

    #[test]
    fn second_fetch_reuses_checked_out_repository() {
        if Command::new("git").arg("--version").output().is_err() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let origin = tmp.path().join("origin");
        std::fs::create_dir(&origin).unwrap();
        git(&origin, &["init", "-q"]);
        git(&origin, &["checkout", "-q", "-b", "main"]);
        std::fs::write(origin.join("README"), "hello\n").unwrap();
        git(&origin, &["add", "README"]);
        git(&origin, &["commit", "-q", "-m", "init"]);
        let sha = git(&origin, &["rev-parse", "HEAD"]);

        let job = Job {
            id: 9,
            git: GitInfo {
                repo_url: origin.to_string_lossy().into_owned(),
                ref_name: "main".into(),
                sha: sha.clone(),
                ..Default::default()
            },
            variables: [JobVariable::new("GIT_LFS_SKIP_SMUDGE", "1")].into_iter().collect(),
            ..Default::default()
        };
        let runner = RunnerConfig::default();
        let build_dir = tmp.path().join("build");
        let info = ShellScriptInfo::new(&job, &runner, build_dir.to_string_lossy());

        let run = || {
            let mut w = BashWriter::new(BashFlavor::Sh, info.temp_dir.clone());
            generate_stage(&mut w, BuildStage::GetSources, &info).unwrap();
            let out = Command::new("sh").arg("-c").arg(w.finish(false)).output().unwrap();
            assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
            String::from_utf8_lossy(&out.stdout).into_owned()
        };

        let first = run();
        assert!(first.contains("Created fresh repository."));
        assert!(build_dir.join("README").exists());

        let second = run();
        assert!(second.contains("Reinitialized existing Git repository"));
        assert!(second.contains(&format!("Checking out {} as main...", &sha[..8])));
        assert!(!second.contains("Created fresh repository."));
    }
}
