use gantry_model::StepName;

use super::{StageOutcome, write_exports};
use crate::{ShellScriptInfo, ShellWriter};

pub(super) fn write_user_script(w: &mut dyn ShellWriter, info: &ShellScriptInfo<'_>) -> StageOutcome {
    let Some(step) = info.job.step(StepName::Script) else {
        return StageOutcome::Skipped;
    };

    write_exports(w, info);
    w.cd(&info.build_dir);

    if let Some(script) = info.runner.pre_build_script.as_deref() {
        write_lines(w, script.lines());
    }
    write_commands(w, info, &step.script);
    if let Some(script) = info.runner.post_build_script.as_deref() {
        write_lines(w, script.lines());
    }
    StageOutcome::Written
}

pub(super) fn write_after_script(w: &mut dyn ShellWriter, info: &ShellScriptInfo<'_>) -> StageOutcome {
    let Some(step) = info
        .job
        .step(StepName::AfterScript)
        .filter(|s| s.script.iter().any(|l| !l.trim().is_empty()))
    else {
        return StageOutcome::Skipped;
    };

    write_exports(w, info);
    w.cd(&info.build_dir);
    write_commands(w, info, &step.script);
    StageOutcome::Written
}

/// Runner-provided snippets run untraced.
fn write_lines<'l>(w: &mut dyn ShellWriter, lines: impl Iterator<Item = &'l str>) {
    for line in lines.filter(|l| !l.trim().is_empty()) {
        w.line(line);
        w.check_for_errors();
    }
}

fn write_commands(w: &mut dyn ShellWriter, info: &ShellScriptInfo<'_>, commands: &[String]) {
    for command in commands {
        let command = command.trim_end();
        if command.trim().is_empty() {
            continue;
        }
        write_echo(w, info, command);
        w.line(command);
        w.check_for_errors();
    }
}

fn write_echo(w: &mut dyn ShellWriter, info: &ShellScriptInfo<'_>, command: &str) {
    let mut lines = command.lines();
    let first = lines.next().unwrap_or_default();
    if lines.next().is_none() {
        w.notice(&format!("$ {command}"));
    } else if info.flags.trace_multiline_commands {
        for line in command.lines() {
            w.notice(&format!("$ {line}"));
        }
    } else {
        w.notice(&format!("$ {first} # collapsed multi-line command"));
    }
}
