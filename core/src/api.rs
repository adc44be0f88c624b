//! Stable facade for the CLI crate and embedders.

pub use crate::backend::{Backend, STDIN_SENTINEL};
pub use crate::config::{
    env_flag_default_true, env_flag_enabled, parse_bool_flag, resolve_agent_config,
    resolve_backend_config, resolve_max_parallel_workers, resolve_timeout, validate_agent_name,
    AgentResolution, WrapperConfig, MAX_PARALLEL_WORKERS_ENV, TIMEOUT_ENV,
};
pub use crate::error::{CliError, ExecutorError, RunnerError, TaskBlockError};
pub use crate::executor::{
    execute_batch, CancelSignal, ExecOptions, ParallelConfig, TaskGraph, TaskResult, TaskSpec,
};
pub use crate::logger::{
    cleanup_old_logs, CleanupFailure, CleanupStats, Logger, RealCleanupEnv, WrapperLogLayer,
    LOG_PREFIX,
};
pub use crate::runner::{
    populate_report_fields, run_task, should_use_stdin, stdin_reasons, RunnerOpts,
    EXIT_CODE_CANCELLED, EXIT_CODE_TIMEOUT,
};
pub use crate::stdio::parse_parallel_config;
pub use crate::stream::{parse_json_stream, NullObserver, StreamObserver, StreamOutcome};
