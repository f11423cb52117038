use thiserror::Error;

/// Reasons a challenge is refused before any worker is spawned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProblemError {
    #[error("unsupported challenge type: {0}")]
    Unsupported(String),
    #[error("missing parameter `{0}`")]
    MissingParameter(&'static str),
    #[error("parameter `{name}` out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        name: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("invalid hash prefix `{0}`")]
    InvalidFingerprint(String),
    #[error("invalid last solution hash `{0}`")]
    InvalidReferenceHash(String),
}

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("job panicked: {0}")]
    JobPanicked(String),
    #[error("job dropped before reporting a result")]
    Disconnected,
    #[error("worker pool is shut down")]
    Closed,
    #[error("fail to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type ProblemResult<T> = Result<T, ProblemError>;
