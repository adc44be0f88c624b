use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("runner failed: {0}")]
    Runner(#[from] RunnerError),
    #[error("invalid arguments: {0}")]
    Usage(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("parallel config error: {0}")]
    TaskBlock(#[from] super::parse::TaskBlockError),
    #[error("executor error: {0}")]
    Executor(#[from] super::executor::ExecutorError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("unsupported backend {0:?}")]
    UnknownBackend(String),
    #[error("executable not found: {0}")]
    CommandNotFound(String),
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("stream io error: {stream} {source}")]
    StreamIo {
        stream: &'static str,
        source: std::io::Error,
    },
    #[error("prompt file error: {0}")]
    PromptFile(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
