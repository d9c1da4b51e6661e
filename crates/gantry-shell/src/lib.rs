//! Script generation for job stages.
//!
//! A [`ShellWriter`] renders a small set of operations (variables, commands,
//! conditionals, messages) into one target shell. The stage generator in
//! [`generate_stage`] drives a writer to produce one build stage, and a
//! [`Shell`] ties a writer to the command line that runs its output.
mod error;
pub use error::{ShellError, ShellResult};

mod writer;
pub use writer::{BashFlavor, BashWriter, PowerShellFlavor, PowerShellWriter, ShellWriter};

pub mod structured;
pub use structured::StructuredWriter;

mod info;
pub use info::{CacheUrlResolver, DEFAULT_HELPER_COMMAND, ShellScriptInfo};

mod stages;
pub use stages::{StageOutcome, generate_stage, generate_stage_named};

mod shell;
pub use shell::{BashShell, PowerShellShell, Shell, ShellCommand, ShellRegistry, StructuredShell};
