//! Error types for the media parser.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the media parser.
#[derive(Error, Debug)]
pub enum Error {
    // Request validation errors
    #[error("Invalid request: {0}")]
    Validation(String),

    // AI errors
    #[error("Malformed AI response: {0}")]
    MalformedAiResponse(String),

    #[error("AI call failed: {0}")]
    AiCall(String),

    #[error("AI call timed out after {0}s")]
    AiTimeout(u64),

    // Pattern store errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Pattern already learned: {0}")]
    DuplicatePattern(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid pattern regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Create a validation error from a string.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Error::Validation(msg.into())
    }

    /// Whether the failed attempt can be deferred to the retry queue.
    ///
    /// Transport failures are transient; a malformed answer is not, the same
    /// prompt would most likely produce the same output again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::AiCall(_) | Error::AiTimeout(_) | Error::Http(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(Error::AiTimeout(30).is_retryable());
        assert!(Error::AiCall("connection refused".into()).is_retryable());
        assert!(!Error::MalformedAiResponse("not json".into()).is_retryable());
        assert!(!Error::validation("empty filename").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("pattern 42".into());
        assert_eq!(err.to_string(), "Not found: pattern 42");

        let err = Error::AiTimeout(120);
        assert!(err.to_string().contains("120"));
    }
}
