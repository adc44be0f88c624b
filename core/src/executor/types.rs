use serde::Serialize;

/// One unit of work submitted to a backend.
#[derive(Debug, Clone, Default)]
pub struct TaskSpec {
    pub id: String,
    /// The prompt text.
    pub task: String,
    pub workdir: String,
    pub dependencies: Vec<String>,
    pub session_id: String,
    pub backend: String,
    pub model: String,
    pub reasoning_effort: String,
    pub agent: String,
    pub prompt_file: String,
    /// True when the prompt file was named directly (flag/config/task key)
    /// rather than supplied by an agent preset; explicit paths may live
    /// outside the confined prompt directories.
    pub prompt_file_explicit: bool,
    pub skip_permissions: bool,
    /// Preset-driven bypass of backend approval/sandbox layers.
    pub yolo: bool,
    /// "new" or "resume".
    pub mode: String,
    /// Derived, never parsed from input.
    pub use_stdin: bool,
}

/// Parsed parallel-mode input: an ordered task list plus the global backend
/// default that fills per-task gaps.
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    pub tasks: Vec<TaskSpec>,
    pub global_backend: String,
}

/// Outcome of running one task.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskResult {
    pub task_id: String,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub log_path: String,

    // Advisory report fields extracted from `message`; they never gate the
    // exit code.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub coverage: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub coverage_num: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub coverage_target: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files_changed: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key_output: String,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub tests_passed: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub tests_failed: u32,
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

impl TaskResult {
    pub fn failed(task_id: impl Into<String>, exit_code: i32, error: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            exit_code,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Scheduler knobs for one batch.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Per-task deadline in seconds; 0 means none.
    pub timeout_secs: u64,
    /// Global worker cap; 0 means unlimited.
    pub max_parallel: usize,
    /// When set, a failing task cancels everything still outstanding and
    /// later layers are skipped. The CLI keeps this off and reports the
    /// worst exit code instead.
    pub fail_fast: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 0,
            max_parallel: 0,
            fail_fast: false,
        }
    }
}
