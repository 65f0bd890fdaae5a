use thiserror::Error;

/// Application-wide error types for examsim.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (non-2xx after retries, unreadable body).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit (HTTP 429) still in effect after exhausting retries.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// A question-set document violates the expected structure.
    #[error("Question set format error: {0}")]
    DocumentFormat(String),

    /// Reading or writing the question cache failed.
    #[error("Cache error: {0}")]
    CacheError(String),

    /// Invalid configuration value.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Filesystem I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded => true,
            _ => false,
        }
    }
}
