use thiserror::Error;

/// Errors produced while building or executing the task dependency graph.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("duplicate task id: {0}")]
    DuplicateTaskId(String),

    #[error("task {task_id:?} depends on unknown task {missing_dep:?}")]
    DependencyNotFound {
        task_id: String,
        missing_dep: String,
    },

    #[error("circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("runner error: {0}")]
    Runner(String),
}
