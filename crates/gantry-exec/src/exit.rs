use std::process::ExitStatus;

use gantry_core::{ExecutorError, ExecutorResult};
use gantry_model::{
    BUILD_FAILURE_EXIT_CODE, BUILD_FAILURE_EXIT_CODE_VAR, SYSTEM_FAILURE_EXIT_CODE,
    SYSTEM_FAILURE_EXIT_CODE_VAR,
};

/// How exit codes of a finished process map to job outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCodes {
    /// A stage script: any non-zero code is the job's own failure.
    Script,
    /// A driver program: only the build sentinel is the job's failure; the
    /// system sentinel and unknown codes are runner faults.
    Driver,
}

/// Variables telling child processes which codes to exit with.
pub fn sentinel_env() -> [(&'static str, String); 2] {
    [
        (BUILD_FAILURE_EXIT_CODE_VAR, BUILD_FAILURE_EXIT_CODE.to_string()),
        (SYSTEM_FAILURE_EXIT_CODE_VAR, SYSTEM_FAILURE_EXIT_CODE.to_string()),
    ]
}

pub fn classify_exit(status: ExitStatus, codes: ExitCodes) -> ExecutorResult<()> {
    if status.success() {
        return Ok(());
    }
    let Some(code) = status.code() else {
        return Err(ExecutorError::System(format!("process terminated by {status}")));
    };
    match codes {
        ExitCodes::Script => Err(ExecutorError::Build { exit_code: code }),
        ExitCodes::Driver if code == BUILD_FAILURE_EXIT_CODE => {
            Err(ExecutorError::Build { exit_code: code })
        }
        ExitCodes::Driver if code == SYSTEM_FAILURE_EXIT_CODE => Err(ExecutorError::System(
            format!("driver reported a system failure (exit code {code})"),
        )),
        ExitCodes::Driver => Err(ExecutorError::System(format!(
            "driver exited with unknown exit code {code}"
        ))),
    }
}
