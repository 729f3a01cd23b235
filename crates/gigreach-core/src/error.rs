use thiserror::Error;

/// Application-wide error types for gigreach.
#[derive(Error, Debug)]
pub enum AppError {
    /// Browser process could not be launched or configured.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// Navigation to a page failed (network, renderer, bad URL).
    #[error("Navigation error: {0}")]
    NavigationError(String),

    /// Page load (or a required content region) timed out.
    #[error("Page load timed out after {0} seconds")]
    Timeout(u64),

    /// The browser session died underneath us.
    #[error("Browser session lost: {0}")]
    SessionLost(String),

    /// Checkpoint file could not be written or read.
    #[error("Checkpoint error: {0}")]
    CheckpointError(String),

    /// CSV serialization/deserialization failed.
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP request failed (composer or mailer call).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// LLM API call failed.
    #[error("LLM error (HTTP {status_code}): {message}")]
    LlmError {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// Delivery service reported a failure.
    #[error("Mailer error: {0}")]
    MailerError(String),

    /// Configuration missing or invalid.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NavigationError(_)
            | AppError::Timeout(_)
            | AppError::SessionLost(_)
            | AppError::NetworkError(_) => true,
            AppError::LlmError { retryable, .. } => *retryable,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }
}
