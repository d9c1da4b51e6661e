//! Well-known names shared between the runner and the processes it spawns.
//!
//! Every job-script process receives both sentinel variables, so a driver
//! script can tell the parent whether a non-zero exit is the user's fault
//! (`exit $BUILD_FAILURE_EXIT_CODE`) or an infrastructure problem
//! (`exit $SYSTEM_FAILURE_EXIT_CODE`) without the parent parsing output.

/// Environment variable carrying the "user script failed" exit code.
pub const BUILD_FAILURE_EXIT_CODE_VAR: &str = "BUILD_FAILURE_EXIT_CODE";

/// Environment variable carrying the "runner machinery failed" exit code.
pub const SYSTEM_FAILURE_EXIT_CODE_VAR: &str = "SYSTEM_FAILURE_EXIT_CODE";

/// Value exported in [`BUILD_FAILURE_EXIT_CODE_VAR`].
pub const BUILD_FAILURE_EXIT_CODE: i32 = 1;

/// Value exported in [`SYSTEM_FAILURE_EXIT_CODE_VAR`].
pub const SYSTEM_FAILURE_EXIT_CODE: i32 = 2;
