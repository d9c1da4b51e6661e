use super::{
    ANSI_ERROR, ANSI_NOTICE, ANSI_RESET, ANSI_WARNING, Blocks, ShellWriter, invalid_name_warning,
    is_valid_name, join,
};

/// PowerShell generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerShellFlavor {
    /// Windows PowerShell 5.x (`powershell`).
    Desktop,
    /// PowerShell 7+ (`pwsh`).
    Core,
}

impl PowerShellFlavor {
    fn eol(&self) -> &'static str {
        match self {
            PowerShellFlavor::Desktop => "\r\n",
            PowerShellFlavor::Core => "\n",
        }
    }

    fn error_check(&self) -> &'static str {
        match self {
            PowerShellFlavor::Desktop => {
                "if(!$?) { Exit &{if($LASTEXITCODE) {$LASTEXITCODE} else {1}} }"
            }
            PowerShellFlavor::Core => {
                "if (-not $?) { exit $(if ($LASTEXITCODE) { $LASTEXITCODE } else { 1 }) }"
            }
        }
    }

    /// Like [`Self::error_check`], but throws so a surrounding `Try` catches it.
    fn error_throw(&self) -> &'static str {
        match self {
            PowerShellFlavor::Desktop => {
                "if(!$?) { throw &{if($LASTEXITCODE) {$LASTEXITCODE} else {1}} }"
            }
            PowerShellFlavor::Core => {
                "if (-not $?) { throw $(if ($LASTEXITCODE) { $LASTEXITCODE } else { 1 }) }"
            }
        }
    }
}

/// Renders PowerShell scripts.
#[derive(Debug)]
pub struct PowerShellWriter {
    flavor: PowerShellFlavor,
    temp_dir: String,
    lines: Vec<String>,
    blocks: Blocks,
}

/// Single-quoted PowerShell string literal.
///
/// PowerShell also ends a single-quoted string on the typographic quotes
/// U+2018 to U+201B, so those are doubled too.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if matches!(c, '\'' | '\u{2018}'..='\u{201B}') {
            out.push(c);
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Argument for a native command.
///
/// Windows PowerShell drops embedded double quotes when building the
/// command line, so they are backslash-escaped first.
fn quote_native(flavor: PowerShellFlavor, s: &str) -> String {
    match flavor {
        PowerShellFlavor::Desktop => quote(&s.replace('"', "\\\"")),
        PowerShellFlavor::Core => quote(s),
    }
}

/// Double-quoted literal; `$env:NAME` references expand.
fn quote_expand(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if matches!(c, '"' | '`') {
            out.push('`');
        }
        out.push(c);
    }
    out.push('"');
    out
}

impl PowerShellWriter {
    pub fn new(flavor: PowerShellFlavor, temp_dir: impl Into<String>) -> Self {
        Self {
            flavor,
            temp_dir: temp_dir.into(),
            lines: Vec::new(),
            blocks: Blocks::default(),
        }
    }

    fn push(&mut self, text: impl AsRef<str>) {
        let indent = "  ".repeat(self.blocks.depth());
        self.lines.push(format!("{indent}{}", text.as_ref()));
    }

    fn invocation(&self, cmd: &str, args: &[&str], expand: bool) -> String {
        let mut words = vec![format!("& {}", quote(cmd))];
        words.extend(args.iter().map(|a| {
            if expand {
                quote_expand(a)
            } else {
                quote_native(self.flavor, a)
            }
        }));
        words.join(" ")
    }

    fn colored(&mut self, color: &str, text: &str) {
        self.push(format!("echo {}", quote(&format!("{color}{text}{ANSI_RESET}"))));
    }

    fn open_if_cmd(&mut self, cmd: &str, args: &[&str], discard_output: bool) {
        let redirect = if discard_output { " 2>$null | Out-Null" } else { "" };
        let invocation = self.invocation(cmd, args, false);
        let check = self.flavor.error_throw();

        self.push("Set-Variable -Name cmdErr -Value $false");
        self.push("Try {");
        self.push(format!("  {invocation}{redirect}"));
        self.push(format!("  {check}"));
        self.push("} Catch {");
        self.push("  Set-Variable -Name cmdErr -Value $true");
        self.push("}");
        self.push("if(!$cmdErr) {");
        self.blocks.open();
    }
}

impl ShellWriter for PowerShellWriter {
    fn env_variable_key(&self, name: &str) -> String {
        format!("$env:{name}")
    }

    fn variable(&mut self, key: &str, value: &str) {
        if !is_valid_name(key) {
            self.warning(&invalid_name_warning(key));
            return;
        }
        self.push(format!("$env:{key}={}", quote(value)));
    }

    fn file_variable(&mut self, key: &str, value: &str, path: &str) {
        if !is_valid_name(key) {
            self.warning(&invalid_name_warning(key));
            return;
        }
        let path = quote(path);
        self.push(format!(
            "[System.IO.File]::WriteAllText({path}, {})",
            quote(value)
        ));
        self.push(format!("$env:{key}={path}"));
    }

    fn command(&mut self, cmd: &str, args: &[&str]) {
        let line = self.invocation(cmd, args, false);
        self.push(line);
    }

    fn command_arg_expand(&mut self, cmd: &str, args: &[&str]) {
        let line = self.invocation(cmd, args, true);
        self.push(line);
    }

    fn line(&mut self, text: &str) {
        self.push(text);
    }

    fn check_for_errors(&mut self) {
        let check = self.flavor.error_check();
        self.push(check);
    }

    fn if_directory(&mut self, path: &str) {
        self.push(format!("if(Test-Path {} -PathType Container) {{", quote(path)));
        self.blocks.open();
    }

    fn if_file(&mut self, path: &str) {
        self.push(format!("if(Test-Path {} -PathType Leaf) {{", quote(path)));
        self.blocks.open();
    }

    fn if_cmd(&mut self, cmd: &str, args: &[&str]) {
        self.open_if_cmd(cmd, args, true);
    }

    fn if_cmd_with_output(&mut self, cmd: &str, args: &[&str]) {
        self.open_if_cmd(cmd, args, false);
    }

    fn else_(&mut self) {
        self.blocks.require_open("else");
        let indent = "  ".repeat(self.blocks.depth() - 1);
        self.lines.push(format!("{indent}}} else {{"));
    }

    fn end_if(&mut self) {
        self.blocks.close();
        self.push("}");
    }

    fn cd(&mut self, path: &str) {
        self.push(format!("cd {}", quote(path)));
        self.check_for_errors();
    }

    fn mkdir(&mut self, path: &str) {
        self.push(format!(
            "New-Item -ItemType directory -Force -Path {} | out-null",
            quote(path)
        ));
    }

    fn rm_file(&mut self, path: &str) {
        let path = quote(path);
        self.push(format!(
            "if(Test-Path {path} -PathType Leaf) {{ Remove-Item -Force {path} }}"
        ));
    }

    fn rm_dir(&mut self, path: &str) {
        let path = quote(path);
        self.push(format!(
            "if(Test-Path {path} -PathType Container) {{ Remove-Item -Force -Recurse {path} }}"
        ));
    }

    fn tmp_file(&self, name: &str) -> String {
        join(&self.temp_dir, name)
    }

    fn print(&mut self, text: &str) {
        self.push(format!("echo {}", quote(text)));
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
        self.push("echo \"\"");
    }

    fn finish(&mut self, trace: bool) -> String {
        assert_eq!(self.blocks.depth(), 0, "script finished with an open conditional block");

        let eol = self.flavor.eol();
        let mut header = vec!["$ErrorActionPreference = \"Continue\""];
        if self.flavor == PowerShellFlavor::Core {
            header.push("$PSNativeCommandArgumentPassing = 'Standard'");
        }
        if trace {
            header.push("Set-PSDebug -Trace 2");
        }

        let mut script = String::new();
        for line in header.into_iter().map(str::to_string).chain(self.lines.drain(..)) {
            script.push_str(&line);
            script.push_str(eol);
        }
        script
    }
}

#[cfg(test)]
mod tests {
    use std::process::Command;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn quotes_double_single_quotes() {
        assert_eq!(quote("it's"), "'it''s'");
        assert_eq!(quote(""), "''");
        assert_eq!(quote("it\u{2019}s"), "'it\u{2019}\u{2019}s'");
        assert_eq!(quote("\u{201B}x"), "'\u{201B}\u{201B}x'");
        assert_eq!(quote_native(PowerShellFlavor::Desktop, "a\"b"), "'a\\\"b'");
        assert_eq!(quote_native(PowerShellFlavor::Core, "a\"b"), "'a\"b'");
    }

    #[test]
    fn flavors_differ_in_error_check_and_line_endings() {
        let mut desktop = PowerShellWriter::new(PowerShellFlavor::Desktop, "C:/tmp");
        desktop.command("git", &["fetch"]);
        desktop.check_for_errors();
        let script = desktop.finish(false);
        assert!(script.contains("& 'git' 'fetch'\r\n"));
        assert!(script.contains("if(!$?) { Exit &{if($LASTEXITCODE) {$LASTEXITCODE} else {1}} }\r\n"));

        let mut core = PowerShellWriter::new(PowerShellFlavor::Core, "/tmp");
        core.command("git", &["fetch"]);
        core.check_for_errors();
        let script = core.finish(false);
        assert!(!script.contains('\r'));
        assert!(script.contains("$PSNativeCommandArgumentPassing = 'Standard'\n"));
        assert!(script.contains("if (-not $?) { exit $(if ($LASTEXITCODE) { $LASTEXITCODE } else { 1 }) }\n"));
    }

    #[test]
    fn if_cmd_uses_try_catch() {
        let mut w = PowerShellWriter::new(PowerShellFlavor::Core, "/tmp");
        w.if_cmd("git-lfs", &["version"]);
        w.command("git", &["lfs", "pull"]);
        w.else_();
        w.print("no lfs");
        w.end_if();
        let script = w.finish(false);
        assert!(script.contains("Try {\n  & 'git-lfs' 'version' 2>$null | Out-Null\n"));
        assert!(script.contains("  if (-not $?) { throw $(if ($LASTEXITCODE)"));
        assert!(script.contains("if(!$cmdErr) {\n  & 'git' 'lfs' 'pull'\n} else {\n  echo 'no lfs'\n}\n"));
    }

    #[test]
    fn expand_quotes_allow_env_references() {
        let mut w = PowerShellWriter::new(PowerShellFlavor::Core, "/tmp");
        let key = w.env_variable_key("CI_SERVER_TLS_CA_FILE");
        w.command_arg_expand("git", &["config", &key]);
        assert!(w.finish(false).contains("& 'git' \"config\" \"$env:CI_SERVER_TLS_CA_FILE\""));
    }

    #[test]
    #[should_panic(expected = "end_if without an open conditional block")]
    fn unbalanced_end_if_panics() {
        PowerShellWriter::new(PowerShellFlavor::Core, "/tmp").end_if();
    }

    fn pwsh_available() -> bool {
        Command::new("pwsh")
            .args(["-NoProfile", "-Command", "exit 0"])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn arguments_round_trip_through_pwsh(args in prop::collection::vec("[ -~\t\n]{1,12}", 1..3)) {
            if !pwsh_available() {
                return Ok(());
            }
            let mut w = PowerShellWriter::new(PowerShellFlavor::Core, "/tmp");
            let refs: Vec<&str> = args.iter().map(String::as_str).collect();
            w.command("printf", &[&["%s\\0"][..], &refs[..]].concat());
            let out = Command::new("pwsh")
                .args(["-NoProfile", "-NonInteractive", "-Command", &w.finish(false)])
                .output()
                .unwrap();
            prop_assert!(out.status.success());

            let mut echoed: Vec<String> = String::from_utf8(out.stdout)
                .unwrap()
                .split('\0')
                .map(str::to_string)
                .collect();
            prop_assert_eq!(echoed.pop(), Some(String::new()));
            prop_assert_eq!(echoed, args);
        }
    }
}
