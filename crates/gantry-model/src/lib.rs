mod domain;
pub use domain::{BUILD_FAILURE_EXIT_CODE, BUILD_FAILURE_EXIT_CODE_VAR};
pub use domain::{Env, KeyValue};
pub use domain::{SYSTEM_FAILURE_EXIT_CODE, SYSTEM_FAILURE_EXIT_CODE_VAR};

mod error;
pub use error::{ModelError, ModelResult};

mod variables;
pub use variables::{JobVariable, Variables, expand_with};

mod job;
pub use job::{
    Artifact, CacheEntry, CachePolicy, Dependency, DependencyArtifactsFile, GitInfo, GitStrategy,
    Job, RefType, Step, StepName, SubmoduleStrategy, When,
};
pub use job::DEFAULT_JOB_TIMEOUT_SECS;

mod config;
pub use config::{
    AutoscalerConfig, AutoscalerPolicy, ConnectorConfig, CustomConfig, FeatureFlags,
    ProcessConfig, RunnerConfig, VmIsolation, seconds_or_default,
};
pub use config::{DEFAULT_EXEC_TIMEOUT, DEFAULT_FORCE_KILL_TIMEOUT, DEFAULT_GRACEFUL_KILL_TIMEOUT};

mod stage;
pub use stage::{BuildStage, ExecutorStage};
