use engine::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("not configured: {0}")]
    NotConfigured(String),
    /// The budgeting service answered with a non-success status.
    #[error("upstream returned status {status}")]
    Upstream { status: u16 },
    #[error("unknown category: {0}")]
    UnknownCategory(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("sync already running for {0}")]
    InProgress(String),
    #[error("sync deadline exceeded")]
    Timeout,
    #[error(transparent)]
    Network(#[from] reqwest::Error),
    #[error(transparent)]
    Engine(EngineError),
}

impl From<EngineError> for SyncError {
    fn from(value: EngineError) -> Self {
        match value {
            EngineError::NotConfigured(msg) => Self::NotConfigured(msg),
            other => Self::Engine(other),
        }
    }
}
