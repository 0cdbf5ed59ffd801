use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubtransError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Translation count mismatch: received {received}, expected {expected}")]
    CountMismatch { received: usize, expected: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Translation cancelled")]
    Cancelled,
}

impl SubtransError {
    /// Errors that justify re-sending a whole batch.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Api(_) | Self::Format(_))
    }
}

pub type Result<T> = std::result::Result<T, SubtransError>;
