//! Structured scripts.
//!
//! Instead of shell text, [`StructuredWriter`] produces a JSON instruction
//! list that [`Interpreter`] executes without a shell for everything but
//! raw user lines.
mod interpret;
pub use interpret::Interpreter;

use serde::{Deserialize, Serialize};

use crate::writer::{ShellWriter, join};

/// Message severity of a [`Instruction::Print`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintLevel {
    Plain,
    Notice,
    Warning,
    Error,
}

/// Branch condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    CommandSucceeds {
        cmd: String,
        args: Vec<String>,
        output: bool,
    },
    DirectoryExists {
        path: String,
    },
    FileExists {
        path: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instruction {
    /// Raw user text, run through the platform shell.
    Line {
        text: String,
        #[serde(default)]
        check: bool,
    },
    Cmd {
        cmd: String,
        args: Vec<String>,
        /// Expand `$NAME` references in arguments before running.
        #[serde(default)]
        expand: bool,
        /// Abort the script when the command fails.
        #[serde(default)]
        check: bool,
    },
    Cd {
        path: String,
    },
    Mkdir {
        path: String,
    },
    Rm {
        path: String,
        recursive: bool,
    },
    Env {
        key: String,
        value: String,
        /// Write the value here and export the path instead.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<String>,
    },
    Print {
        level: PrintLevel,
        text: String,
    },
    If {
        condition: Condition,
        then: Vec<Instruction>,
        #[serde(rename = "else", default, skip_serializing_if = "Vec::is_empty")]
        otherwise: Vec<Instruction>,
    },
}

/// A complete structured script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub trace: bool,
    pub instructions: Vec<Instruction>,
}

impl Script {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

struct OpenIf {
    condition: Condition,
    then: Vec<Instruction>,
    otherwise: Option<Vec<Instruction>>,
}

/// Builds a [`Script`].
#[derive(Default)]
pub struct StructuredWriter {
    temp_dir: String,
    root: Vec<Instruction>,
    open: Vec<OpenIf>,
}

impl StructuredWriter {
    pub fn new(temp_dir: impl Into<String>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            ..Default::default()
        }
    }

    fn current(&mut self) -> &mut Vec<Instruction> {
        match self.open.last_mut() {
            Some(OpenIf {
                otherwise: Some(otherwise),
                ..
            }) => otherwise,
            Some(block) => &mut block.then,
            None => &mut self.root,
        }
    }

    fn push(&mut self, instruction: Instruction) {
        self.current().push(instruction);
    }

    fn open_if(&mut self, condition: Condition) {
        self.open.push(OpenIf {
            condition,
            then: Vec::new(),
            otherwise: None,
        });
    }

    fn cmd(&mut self, cmd: &str, args: &[&str], expand: bool) {
        self.push(Instruction::Cmd {
            cmd: cmd.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            expand,
            check: false,
        });
    }

    fn print_at(&mut self, level: PrintLevel, text: &str) {
        self.push(Instruction::Print {
            level,
            text: text.to_string(),
        });
    }

    /// Take the built script.
    pub fn into_script(mut self, trace: bool) -> Script {
        assert!(self.open.is_empty(), "script finished with an open conditional block");
        Script {
            trace,
            instructions: std::mem::take(&mut self.root),
        }
    }
}

impl ShellWriter for StructuredWriter {
    fn env_variable_key(&self, name: &str) -> String {
        format!("${name}")
    }

    fn variable(&mut self, key: &str, value: &str) {
        self.push(Instruction::Env {
            key: key.to_string(),
            value: value.to_string(),
            file: None,
        });
    }

    fn file_variable(&mut self, key: &str, value: &str, path: &str) {
        self.push(Instruction::Env {
            key: key.to_string(),
            value: value.to_string(),
            file: Some(path.to_string()),
        });
    }

    fn command(&mut self, cmd: &str, args: &[&str]) {
        self.cmd(cmd, args, false);
    }

    fn command_arg_expand(&mut self, cmd: &str, args: &[&str]) {
        self.cmd(cmd, args, true);
    }

    fn line(&mut self, text: &str) {
        self.push(Instruction::Line {
            text: text.to_string(),
            check: false,
        });
    }

    fn check_for_errors(&mut self) {
        if let Some(Instruction::Cmd { check, .. } | Instruction::Line { check, .. }) =
            self.current().last_mut()
        {
            *check = true;
        }
    }

    fn if_directory(&mut self, path: &str) {
        self.open_if(Condition::DirectoryExists {
            path: path.to_string(),
        });
    }

    fn if_file(&mut self, path: &str) {
        self.open_if(Condition::FileExists {
            path: path.to_string(),
        });
    }

    fn if_cmd(&mut self, cmd: &str, args: &[&str]) {
        self.open_if(Condition::CommandSucceeds {
            cmd: cmd.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            output: false,
        });
    }

    fn if_cmd_with_output(&mut self, cmd: &str, args: &[&str]) {
        self.open_if(Condition::CommandSucceeds {
            cmd: cmd.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            output: true,
        });
    }

    fn else_(&mut self) {
        let block = self
            .open
            .last_mut()
            .unwrap_or_else(|| panic!("else without an open conditional block"));
        assert!(block.otherwise.is_none(), "else used twice in one conditional block");
        block.otherwise = Some(Vec::new());
    }

    fn end_if(&mut self) {
        let block = self
            .open
            .pop()
            .unwrap_or_else(|| panic!("end_if without an open conditional block"));
        self.push(Instruction::If {
            condition: block.condition,
            then: block.then,
            otherwise: block.otherwise.unwrap_or_default(),
        });
    }

    fn cd(&mut self, path: &str) {
        self.push(Instruction::Cd {
            path: path.to_string(),
        });
    }

    fn mkdir(&mut self, path: &str) {
        self.push(Instruction::Mkdir {
            path: path.to_string(),
        });
    }

    fn rm_file(&mut self, path: &str) {
        self.push(Instruction::Rm {
            path: path.to_string(),
            recursive: false,
        });
    }

    fn rm_dir(&mut self, path: &str) {
        self.push(Instruction::Rm {
            path: path.to_string(),
            recursive: true,
        });
    }

    fn tmp_file(&self, name: &str) -> String {
        join(&self.temp_dir, name)
    }

    fn print(&mut self, text: &str) {
        self.print_at(PrintLevel::Plain, text);
    }

    fn notice(&mut self, text: &str) {
        self.print_at(PrintLevel::Notice, text);
    }

    fn warning(&mut self, text: &str) {
        self.print_at(PrintLevel::Warning, text);
    }

    fn error(&mut self, text: &str) {
        self.print_at(PrintLevel::Error, text);
    }

    fn empty_line(&mut self) {
        self.print_at(PrintLevel::Plain, "");
    }

    fn finish(&mut self, trace: bool) -> String {
        let script = std::mem::take(self).into_script(trace);
        // Serializing plain strings and enums cannot fail.
        serde_json::to_string(&script).unwrap_or_default()
    }
}
