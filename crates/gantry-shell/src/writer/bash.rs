use std::borrow::Cow;

use shell_escape::unix::escape;

use super::{
    ANSI_ERROR, ANSI_NOTICE, ANSI_RESET, ANSI_WARNING, Blocks, ShellWriter, invalid_name_warning,
    is_valid_name, join,
};

/// POSIX shell family member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BashFlavor {
    Bash,
    Sh,
}

/// Renders sh/bash scripts.
#[derive(Debug)]
pub struct BashWriter {
    flavor: BashFlavor,
    temp_dir: String,
    /// Emit an explicit `$?` check after each checked command.
    exit_code_check: bool,
    lines: Vec<String>,
    blocks: Blocks,
}

/// Quote `s` so the shell passes it through as one literal word.
pub fn quote(s: &str) -> String {
    escape(Cow::Borrowed(s)).into_owned()
}

/// Double-quote `s`, leaving `$` references for the shell to expand.
fn quote_expand(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if matches!(c, '"' | '\\' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn join_words(cmd: &str, args: &[&str], quote_arg: fn(&str) -> String) -> String {
    std::iter::once(quote(cmd))
        .chain(args.iter().map(|a| quote_arg(a)))
        .collect::<Vec<_>>()
        .join(" ")
}

impl BashWriter {
    pub fn new(flavor: BashFlavor, temp_dir: impl Into<String>) -> Self {
        Self {
            flavor,
            temp_dir: temp_dir.into(),
            exit_code_check: false,
            lines: Vec::new(),
            blocks: Blocks::default(),
        }
    }

    pub fn with_exit_code_check(mut self, enabled: bool) -> Self {
        self.exit_code_check = enabled;
        self
    }

    /// Quoted words may span lines, so only the first line is indented.
    fn push(&mut self, text: impl AsRef<str>) {
        let indent = "  ".repeat(self.blocks.depth());
        self.lines.push(format!("{indent}{}", text.as_ref()));
    }

    fn push_dedented(&mut self, text: &str) {
        let indent = "  ".repeat(self.blocks.depth().saturating_sub(1));
        self.lines.push(format!("{indent}{text}"));
    }

    fn colored(&mut self, color: &str, text: &str) {
        let message = format!("{color}{text}{ANSI_RESET}");
        self.push(format!("printf '%s\\n' {}", quote(&message)));
    }
}

impl ShellWriter for BashWriter {
    fn env_variable_key(&self, name: &str) -> String {
        format!("${name}")
    }

    fn variable(&mut self, key: &str, value: &str) {
        if !is_valid_name(key) {
            self.warning(&invalid_name_warning(key));
            return;
        }
        self.push(format!("export {key}={}", quote(value)));
    }

    fn file_variable(&mut self, key: &str, value: &str, path: &str) {
        if !is_valid_name(key) {
            self.warning(&invalid_name_warning(key));
            return;
        }
        let path = quote(path);
        self.push(format!("printf '%s' {} > {path}", quote(value)));
        self.push(format!("export {key}={path}"));
    }

    fn command(&mut self, cmd: &str, args: &[&str]) {
        let line = join_words(cmd, args, quote);
        self.push(line);
    }

    fn command_arg_expand(&mut self, cmd: &str, args: &[&str]) {
        let line = join_words(cmd, args, quote_expand);
        self.push(line);
    }

    fn line(&mut self, text: &str) {
        self.push(text);
    }

    fn check_for_errors(&mut self) {
        if self.exit_code_check {
            self.push(
                "_gantry_exit_code=$?; if [ \"$_gantry_exit_code\" -ne 0 ]; then exit \"$_gantry_exit_code\"; fi",
            );
        }
    }

    fn if_directory(&mut self, path: &str) {
        self.push(format!("if [ -d {} ]; then", quote(path)));
        self.blocks.open();
    }

    fn if_file(&mut self, path: &str) {
        self.push(format!("if [ -e {} ]; then", quote(path)));
        self.blocks.open();
    }

    fn if_cmd(&mut self, cmd: &str, args: &[&str]) {
        self.push(format!("if {} >/dev/null 2>&1; then", join_words(cmd, args, quote)));
        self.blocks.open();
    }

    fn if_cmd_with_output(&mut self, cmd: &str, args: &[&str]) {
        self.push(format!("if {}; then", join_words(cmd, args, quote)));
        self.blocks.open();
    }

    fn else_(&mut self) {
        self.blocks.require_open("else");
        self.push_dedented("else");
    }

    fn end_if(&mut self) {
        self.blocks.close();
        self.push("fi");
    }

    fn cd(&mut self, path: &str) {
        self.push(format!("cd {}", quote(path)));
        self.check_for_errors();
    }

    fn mkdir(&mut self, path: &str) {
        self.push(format!("mkdir -p {}", quote(path)));
    }

    fn rm_file(&mut self, path: &str) {
        self.push(format!("rm -f {}", quote(path)));
    }

    fn rm_dir(&mut self, path: &str) {
        self.push(format!("rm -r -f {}", quote(path)));
    }

    fn tmp_file(&self, name: &str) -> String {
        join(&self.temp_dir, name)
    }

    fn print(&mut self, text: &str) {
        self.push(format!("printf '%s\\n' {}", quote(text)));
    }

    fn notice(&mut self, text: &str) {
        self.colored(ANSI_NOTICE, text);
    }

    fn warning(&mut self, text: &str) {
        self.colored(ANSI_WARNING, text);
    }

    fn error(&mut self, text: &str) {
        self.colored(ANSI_ERROR, text);
    }

    fn empty_line(&mut self) {
        self.push("echo");
    }

    fn finish(&mut self, trace: bool) -> String {
        assert_eq!(self.blocks.depth(), 0, "script finished with an open conditional block");

        let mut script = String::new();
        match self.flavor {
            BashFlavor::Bash => {
                script.push_str("#!/usr/bin/env bash\n\n");
                script.push_str("set -eo pipefail\n");
                if trace {
                    script.push_str("set -o xtrace\n");
                }
            }
            BashFlavor::Sh => {
                script.push_str("#!/bin/sh\n\n");
                script.push_str("set -e\n");
                if trace {
                    script.push_str("set -x\n");
                }
            }
        }
        script.push_str("set +o noclobber\n\n");
        for line in self.lines.drain(..) {
            script.push_str(&line);
            script.push('\n');
        }
        script
    }
}
