//! Per-task process runner: backend launch, stream pumping, deadlines and
//! teardown, result assembly.

pub mod abort;
pub mod prompt;
pub mod report;
pub mod runtime;
pub mod session;
pub mod stdin;

pub use abort::DEFAULT_FORCE_KILL_GRACE;
pub use prompt::{read_agent_prompt_file, wrap_task_with_agent_prompt};
pub use report::populate_report_fields;
pub use runtime::{run_task, RunnerOpts, EXIT_CODE_CANCELLED, EXIT_CODE_TIMEOUT};
pub use session::{ChildSession, RunnerSession};
pub use stdin::{should_use_stdin, stdin_reasons};
