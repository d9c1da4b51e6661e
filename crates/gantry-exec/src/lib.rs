//! Local executors for gantry.
//!
//! [`ShellProvider`] runs stage scripts directly on the host;
//! [`CustomProvider`] hands them to user-supplied driver programs. Both
//! share the process helpers in [`process`].
mod error;
pub use error::{ProcessError, ProcessResult};

pub mod process;
pub use process::{
    KillPolicy, ProcessExit, ProcessGroup, Signal, Signaler, kill_and_wait, run_captured,
    run_traced, spawn_process, wait_or_kill,
};

mod exit;
pub use exit::{ExitCodes, classify_exit, sentinel_env};

mod binding;
mod host;
mod script;

mod shell;
pub use shell::{ShellExecutor, ShellProvider};

mod custom;
pub use custom::{CustomExecutor, CustomProvider, DriverConfig};
