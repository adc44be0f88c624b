use thiserror::Error;

/// Errors produced while parsing the `---TASK---` block document fed to
/// parallel mode.
#[derive(Error, Debug)]
pub enum TaskBlockError {
    #[error("parallel config is empty")]
    EmptyInput,

    #[error("no tasks found")]
    NoTasks,

    #[error("task block #{0} missing ---CONTENT--- separator")]
    MissingContentMarker(usize),

    #[error("task block #{0} missing id field")]
    MissingId(usize),

    #[error("task block #{index} ({id:?}) missing content")]
    MissingContent { index: usize, id: String },

    #[error("task block #{0} has invalid workdir: '-' is not a valid directory path")]
    InvalidWorkdir(usize),

    #[error("task block #{index} ({id:?}) has empty session_id")]
    EmptySessionId { index: usize, id: String },

    #[error("task block #{0} has empty agent field")]
    EmptyAgent(usize),

    #[error("task block #{index} invalid agent name: {reason}")]
    InvalidAgent { index: usize, reason: String },

    #[error("task block #{index} has duplicate id: {id}")]
    DuplicateId { index: usize, id: String },
}
