//! Named shells: a writer factory plus the command line that runs its output.
use std::{collections::BTreeMap, sync::Arc};

use gantry_model::BuildStage;
use tracing::{debug, trace};

use crate::{
    BashFlavor, BashWriter, PowerShellFlavor, PowerShellWriter, ShellError, ShellResult,
    ShellScriptInfo, ShellWriter, StageOutcome, generate_stage, structured::StructuredWriter,
};

/// How to execute a rendered script stored at a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
}

pub trait Shell: Send + Sync {
    fn name(&self) -> &'static str;

    /// File extension rendered scripts are saved with.
    fn extension(&self) -> &'static str;

    /// Fresh writer for one stage.
    fn writer(&self, info: &ShellScriptInfo<'_>) -> Box<dyn ShellWriter>;

    fn script_command(&self, script_path: &str) -> ShellCommand;

    /// Render `stage`, or `None` when the stage has nothing to do.
    fn generate_script(
        &self,
        stage: BuildStage,
        info: &ShellScriptInfo<'_>,
    ) -> ShellResult<Option<String>> {
        let mut w = self.writer(info);
        match generate_stage(w.as_mut(), stage, info)? {
            StageOutcome::Written => Ok(Some(w.finish(info.trace()))),
            StageOutcome::Skipped => {
                trace!(shell = self.name(), %stage, "stage skipped");
                Ok(None)
            }
        }
    }
}

/// `bash` or POSIX `sh`.
pub struct BashShell {
    flavor: BashFlavor,
}

impl BashShell {
    pub fn bash() -> Self {
        Self {
            flavor: BashFlavor::Bash,
        }
    }

    pub fn sh() -> Self {
        Self {
            flavor: BashFlavor::Sh,
        }
    }
}

impl Shell for BashShell {
    fn name(&self) -> &'static str {
        match self.flavor {
            BashFlavor::Bash => "bash",
            BashFlavor::Sh => "sh",
        }
    }

    fn extension(&self) -> &'static str {
        "sh"
    }

    fn writer(&self, info: &ShellScriptInfo<'_>) -> Box<dyn ShellWriter> {
        Box::new(
            BashWriter::new(self.flavor, info.temp_dir.clone())
                .with_exit_code_check(info.flags.use_exit_code_check),
        )
    }

    fn script_command(&self, script_path: &str) -> ShellCommand {
        ShellCommand {
            program: self.name().to_string(),
            args: vec![script_path.to_string()],
        }
    }
}

/// Windows PowerShell (`powershell`) or PowerShell Core (`pwsh`).
pub struct PowerShellShell {
    flavor: PowerShellFlavor,
}

impl PowerShellShell {
    pub fn desktop() -> Self {
        Self {
            flavor: PowerShellFlavor::Desktop,
        }
    }

    pub fn core() -> Self {
        Self {
            flavor: PowerShellFlavor::Core,
        }
    }
}

impl Shell for PowerShellShell {
    fn name(&self) -> &'static str {
        match self.flavor {
            PowerShellFlavor::Desktop => "powershell",
            PowerShellFlavor::Core => "pwsh",
        }
    }

    fn extension(&self) -> &'static str {
        "ps1"
    }

    fn writer(&self, info: &ShellScriptInfo<'_>) -> Box<dyn ShellWriter> {
        Box::new(PowerShellWriter::new(self.flavor, info.temp_dir.clone()))
    }

    fn script_command(&self, script_path: &str) -> ShellCommand {
        let mut args: Vec<String> = ["-NoProfile", "-NonInteractive"]
            .into_iter()
            .map(String::from)
            .collect();
        if self.flavor == PowerShellFlavor::Desktop {
            args.extend(["-ExecutionPolicy".to_string(), "Bypass".to_string()]);
        }
        args.extend(["-File".to_string(), script_path.to_string()]);
        ShellCommand {
            program: self.name().to_string(),
            args,
        }
    }
}

/// JSON instruction list run by `gantry-agentd run-structured`.
pub struct StructuredShell {
    interpreter: String,
}

impl StructuredShell {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }
}

impl Default for StructuredShell {
    fn default() -> Self {
        Self::new("gantry-agentd")
    }
}

impl Shell for StructuredShell {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn writer(&self, info: &ShellScriptInfo<'_>) -> Box<dyn ShellWriter> {
        Box::new(StructuredWriter::new(info.temp_dir.clone()))
    }

    fn script_command(&self, script_path: &str) -> ShellCommand {
        ShellCommand {
            program: self.interpreter.clone(),
            args: vec!["run-structured".to_string(), script_path.to_string()],
        }
    }
}

/// Registry of shells by name.
pub struct ShellRegistry {
    shells: BTreeMap<&'static str, Arc<dyn Shell>>,
    default: &'static str,
}

impl ShellRegistry {
    /// Empty registry whose default shell is `default`.
    pub fn new(default: &'static str) -> Self {
        Self {
            shells: BTreeMap::new(),
            default,
        }
    }

    /// Registry with every built-in shell; `bash` is the default.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new("bash");
        registry.register(Arc::new(BashShell::bash()));
        registry.register(Arc::new(BashShell::sh()));
        registry.register(Arc::new(PowerShellShell::desktop()));
        registry.register(Arc::new(PowerShellShell::core()));
        registry.register(Arc::new(StructuredShell::default()));
        registry
    }

    /// Add `shell`, replacing any shell registered under the same name.
    pub fn register(&mut self, shell: Arc<dyn Shell>) {
        debug!(shell = shell.name(), "shell registered");
        self.shells.insert(shell.name(), shell);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Shell>> {
        self.shells.get(name)
    }

    /// Shell named by the runner config, falling back to the default.
    pub fn resolve(&self, name: Option<&str>) -> ShellResult<Arc<dyn Shell>> {
        let name = name.filter(|n| !n.is_empty()).unwrap_or(self.default);
        self.get(name)
            .cloned()
            .ok_or_else(|| ShellError::UnknownShell(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.shells.keys().copied()
    }
}
