mod kv;
pub use kv::KeyValue;

mod env;
pub use env::Env;

mod constants;
pub use constants::{BUILD_FAILURE_EXIT_CODE, BUILD_FAILURE_EXIT_CODE_VAR};
pub use constants::{SYSTEM_FAILURE_EXIT_CODE, SYSTEM_FAILURE_EXIT_CODE_VAR};
