use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeedError>;

#[derive(Debug, Error)]
pub enum FeedError {
    /// Malformed input (empty ID, out-of-range value). Rejected synchronously,
    /// never partially applied.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operating on an unknown item or user. No state change.
    #[error("Not found: {0}")]
    NotFound(String),

    /// External document store failure. Non-fatal: in-memory state is
    /// authoritative and is not rolled back.
    #[error("Persistence error: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<anyhow::Error> for FeedError {
    fn from(err: anyhow::Error) -> Self {
        FeedError::Persistence(err)
    }
}

impl FeedError {
    pub fn validation(msg: impl Into<String>) -> Self {
        FeedError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        FeedError::NotFound(msg.into())
    }
}
