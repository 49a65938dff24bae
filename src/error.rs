use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SentinelError {
    /// Rejected at construction, never at runtime.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("signal source failed: {0}")]
    SourceFailure(String),

    #[error("action execution failed: {0}")]
    ExecutionFailure(String),

    /// Rejected at the boundary without touching shared state.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("sentinel is stopped")]
    Stopped,
}

impl SentinelError {
    pub fn config(msg: impl Into<String>) -> Self {
        SentinelError::Config(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        SentinelError::InvalidInput(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SentinelError::Config(_) => "config",
            SentinelError::SourceFailure(_) => "source_failure",
            SentinelError::ExecutionFailure(_) => "execution_failure",
            SentinelError::InvalidInput(_) => "invalid_input",
            SentinelError::Stopped => "stopped",
        }
    }
}

pub type SentinelResult<T> = Result<T, SentinelError>;
