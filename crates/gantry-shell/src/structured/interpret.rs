use std::{
    collections::HashMap,
    future::Future,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    pin::Pin,
    process::Stdio,
    sync::atomic::{AtomicU64, Ordering},
};

use tokio::process::Command;
use tracing::{debug, trace};

use gantry_model::expand_with;

use super::{Condition, Instruction, PrintLevel, Script};
use crate::writer::{ANSI_ERROR, ANSI_NOTICE, ANSI_RESET, ANSI_WARNING};
use crate::ShellResult;

/// Exit code used when a command cannot be started.
const NOT_FOUND_EXIT_CODE: i32 = 127;

static LINE_SEQ: AtomicU64 = AtomicU64::new(0);

enum Flow {
    Continue,
    Exit(i32),
}

/// Executes a structured [`Script`].
///
/// The interpreter keeps its own working directory and environment; child
/// processes inherit stdout/stderr. A `cd` or `export` inside a script line
/// carries over to the following instructions, as it would in one shell
/// session.
pub struct Interpreter {
    cwd: PathBuf,
    env: HashMap<String, String>,
    trace: bool,
}

impl Interpreter {
    /// Start in `cwd` with the current process environment.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            env: std::env::vars().collect(),
            trace: false,
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn env(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// Run `script`; returns the exit code a shell would have returned.
    pub async fn run(&mut self, script: &Script) -> ShellResult<i32> {
        self.trace = script.trace;
        match self.block(&script.instructions).await? {
            Flow::Continue => Ok(0),
            Flow::Exit(code) => Ok(code),
        }
    }

    fn block<'a>(
        &'a mut self,
        instructions: &'a [Instruction],
    ) -> Pin<Box<dyn Future<Output = ShellResult<Flow>> + Send + 'a>> {
        Box::pin(async move {
            for instruction in instructions {
                if let Flow::Exit(code) = self.step(instruction).await? {
                    return Ok(Flow::Exit(code));
                }
            }
            Ok(Flow::Continue)
        })
    }

    async fn step(&mut self, instruction: &Instruction) -> ShellResult<Flow> {
        match instruction {
            Instruction::Line { text, check } => {
                let code = self.shell_line(text).await;
                Ok(checked(code, *check))
            }
            Instruction::Cmd {
                cmd,
                args,
                expand,
                check,
            } => {
                let args: Vec<String> = if *expand {
                    args.iter().map(|a| self.expand(a)).collect()
                } else {
                    args.clone()
                };
                let code = self.exec(cmd, &args, true).await;
                Ok(checked(code, *check))
            }
            Instruction::Cd { path } => {
                let target = self.resolve(path);
                if !target.is_dir() {
                    self.print(PrintLevel::Error, &format!("cd: {}: no such directory", target.display()));
                    return Ok(Flow::Exit(1));
                }
                self.cwd = target;
                Ok(Flow::Continue)
            }
            Instruction::Mkdir { path } => {
                tokio::fs::create_dir_all(self.resolve(path)).await?;
                Ok(Flow::Continue)
            }
            Instruction::Rm { path, recursive } => {
                let target = self.resolve(path);
                let res = if *recursive {
                    tokio::fs::remove_dir_all(&target).await
                } else {
                    tokio::fs::remove_file(&target).await
                };
                match res {
                    Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
                    _ => Ok(Flow::Continue),
                }
            }
            Instruction::Env { key, value, file } => {
                let value = match file {
                    Some(path) => {
                        let path = self.resolve(path);
                        if let Some(parent) = path.parent() {
                            tokio::fs::create_dir_all(parent).await?;
                        }
                        tokio::fs::write(&path, value).await?;
                        path.to_string_lossy().into_owned()
                    }
                    None => value.clone(),
                };
                self.env.insert(key.clone(), value);
                Ok(Flow::Continue)
            }
            Instruction::Print { level, text } => {
                self.print(*level, text);
                Ok(Flow::Continue)
            }
            Instruction::If {
                condition,
                then,
                otherwise,
            } => {
                if self.holds(condition).await {
                    self.block(then).await
                } else {
                    self.block(otherwise).await
                }
            }
        }
    }

    async fn holds(&self, condition: &Condition) -> bool {
        match condition {
            Condition::CommandSucceeds { cmd, args, output } => {
                self.exec(cmd, args, *output).await == 0
            }
            Condition::DirectoryExists { path } => self.resolve(path).is_dir(),
            Condition::FileExists { path } => self.resolve(path).exists(),
        }
    }

    async fn exec(&self, cmd: &str, args: &[String], output: bool) -> i32 {
        if self.trace {
            self.print(PrintLevel::Plain, &format!("+ {cmd} {}", args.join(" ")));
        }
        let mut command = Command::new(cmd);
        command.args(args);
        self.run_command(command, output).await
    }

    #[cfg(unix)]
    async fn shell_line(&mut self, text: &str) -> i32 {
        if self.trace {
            self.print(PrintLevel::Plain, &format!("+ {text}"));
        }
        let state = std::env::temp_dir().join(format!(
            "gantry-line-{}-{}",
            std::process::id(),
            LINE_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        let cwd_file = state.with_extension("cwd");
        let env_file = state.with_extension("env");
        let quote = |p: &Path| shell_escape::unix::escape(p.to_string_lossy()).into_owned();
        let wrapped = format!(
            "trap 'pwd > {cwd}; env -0 > {env}' EXIT\n{text}\n",
            cwd = quote(&cwd_file),
            env = quote(&env_file),
        );

        let mut command = Command::new("sh");
        command.arg("-c").arg(wrapped);
        let code = self.run_command(command, true).await;
        self.absorb_state(&cwd_file, &env_file).await;
        code
    }

    #[cfg(not(unix))]
    async fn shell_line(&mut self, text: &str) -> i32 {
        if self.trace {
            self.print(PrintLevel::Plain, &format!("+ {text}"));
        }
        let mut command = Command::new("powershell");
        command.args(["-NoProfile", "-NonInteractive", "-Command", text]);
        self.run_command(command, true).await
    }

    /// Picks up the directory and environment a script line left behind.
    #[cfg(unix)]
    async fn absorb_state(&mut self, cwd_file: &Path, env_file: &Path) {
        if let Ok(cwd) = tokio::fs::read_to_string(cwd_file).await {
            let cwd = PathBuf::from(cwd.trim_end_matches('\n'));
            if cwd.is_dir() {
                self.cwd = cwd;
            }
        }
        if let Ok(raw) = tokio::fs::read(env_file).await {
            let env: HashMap<String, String> = raw
                .split(|b| *b == 0)
                .filter_map(|entry| {
                    let entry = String::from_utf8_lossy(entry);
                    let (key, value) = entry.split_once('=')?;
                    (!key.is_empty() && key != "_").then(|| (key.to_string(), value.to_string()))
                })
                .collect();
            if !env.is_empty() {
                self.env = env;
            }
        }
        for file in [cwd_file, env_file] {
            if let Err(e) = tokio::fs::remove_file(file).await {
                trace!(error = %e, file = %file.display(), "line state file not removed");
            }
        }
    }

    async fn run_command(&self, mut command: Command, output: bool) -> i32 {
        command
            .current_dir(&self.cwd)
            .env_clear()
            .envs(&self.env)
            .stdin(Stdio::null());
        if !output {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        match command.status().await {
            Ok(status) => {
                trace!(?status, "structured command finished");
                status.code().unwrap_or(1)
            }
            Err(e) => {
                debug!(error = %e, "structured command failed to start");
                NOT_FOUND_EXIT_CODE
            }
        }
    }

    fn expand(&self, input: &str) -> String {
        expand_with(input, |name| self.env.get(name).cloned())
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.cwd.join(self.expand(path))
    }

    fn print(&self, level: PrintLevel, text: &str) {
        let color = match level {
            PrintLevel::Plain => "",
            PrintLevel::Notice => ANSI_NOTICE,
            PrintLevel::Warning => ANSI_WARNING,
            PrintLevel::Error => ANSI_ERROR,
        };
        let reset = if color.is_empty() { "" } else { ANSI_RESET };
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{color}{text}{reset}");
    }
}

fn checked(code: i32, check: bool) -> Flow {
    if check && code != 0 {
        Flow::Exit(code)
    } else {
        Flow::Continue
    }
}
