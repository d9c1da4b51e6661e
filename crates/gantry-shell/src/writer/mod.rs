//! Script writers.
//!
//! A [`ShellWriter`] accumulates abstract operations and renders them for one
//! target dialect. Writers are single-use: one writer per generated stage.
mod bash;
pub use bash::{BashFlavor, BashWriter};

mod powershell;
pub use powershell::{PowerShellFlavor, PowerShellWriter};

/// Bold green.
pub(crate) const ANSI_NOTICE: &str = "\x1b[32;1m";
/// Yellow.
pub(crate) const ANSI_WARNING: &str = "\x1b[0;33m";
/// Bold red.
pub(crate) const ANSI_ERROR: &str = "\x1b[31;1m";
pub(crate) const ANSI_RESET: &str = "\x1b[0;m";

/// `[A-Za-z_][A-Za-z0-9_]*`; anything else would be parsed as script text.
pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn invalid_name_warning(name: &str) -> String {
    format!("Skipping variable with invalid name {name:?}")
}

/// Dialect-independent script builder.
///
/// `else_`/`end_if` without an open conditional block panic: that is a bug
/// in the generator, never a runtime condition.
pub trait ShellWriter: Send {
    /// Reference to an environment variable, usable in expanded arguments.
    fn env_variable_key(&self, name: &str) -> String;

    /// Export a variable to every following command.
    fn variable(&mut self, key: &str, value: &str);
    /// Write `value` to `path` and export `key` pointing at it.
    fn file_variable(&mut self, key: &str, value: &str, path: &str);

    /// Run `cmd` with every argument quoted literally.
    fn command(&mut self, cmd: &str, args: &[&str]);
    /// Run `cmd`, letting the shell expand variable references in arguments.
    fn command_arg_expand(&mut self, cmd: &str, args: &[&str]);
    /// Raw script text; executed as-is.
    fn line(&mut self, text: &str);
    /// Abort the script with the last exit code if the previous command failed.
    fn check_for_errors(&mut self);

    fn if_directory(&mut self, path: &str);
    fn if_file(&mut self, path: &str);
    /// Branch on `cmd` succeeding; its output is discarded.
    fn if_cmd(&mut self, cmd: &str, args: &[&str]);
    /// Branch on `cmd` succeeding; its output is kept.
    fn if_cmd_with_output(&mut self, cmd: &str, args: &[&str]);
    fn else_(&mut self);
    fn end_if(&mut self);

    fn cd(&mut self, path: &str);
    fn mkdir(&mut self, path: &str);
    fn rm_file(&mut self, path: &str);
    fn rm_dir(&mut self, path: &str);

    /// Path of `name` under the job-scoped temporary directory.
    fn tmp_file(&self, name: &str) -> String;

    fn print(&mut self, text: &str);
    fn notice(&mut self, text: &str);
    fn warning(&mut self, text: &str);
    fn error(&mut self, text: &str);
    fn empty_line(&mut self);

    /// Render the accumulated operations. `trace` enables command echoing.
    fn finish(&mut self, trace: bool) -> String;
}

/// Open conditional blocks of a text writer.
#[derive(Debug, Default)]
pub(crate) struct Blocks {
    depth: usize,
}

impl Blocks {
    pub(crate) fn open(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn require_open(&self, op: &str) {
        assert!(self.depth > 0, "{op} without an open conditional block");
    }

    pub(crate) fn close(&mut self) {
        self.require_open("end_if");
        self.depth -= 1;
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }
}

/// Join `name` onto a directory using forward slashes.
pub(crate) fn join(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches(['/', '\\']), name)
}
