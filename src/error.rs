//! Error types for livecap.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LivecapError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio source errors
    #[error("Audio source failed: {message}")]
    AudioSource { message: String },

    #[error("Audio format mismatch: expected {expected}, got {actual}")]
    AudioFormatMismatch { expected: String, actual: String },

    // Transcription backend errors
    #[error("Backend request failed: {message}")]
    BackendTransient { message: String },

    #[error("Backend rejected authentication: {message}")]
    BackendAuth { message: String },

    #[error("Backend quota exhausted: {message}")]
    BackendQuota { message: String },

    #[error("Malformed backend response: {message}")]
    BackendMalformed { message: String },

    // Session errors
    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    // Recording errors
    #[error("Recording failed: {message}")]
    Recording { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl LivecapError {
    /// Whether a failed backend call may succeed if retried.
    ///
    /// Only transient failures (network hiccups, rate limiting, 5xx) qualify.
    /// Malformed responses are not retryable: the backend answered, the answer
    /// was just unusable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LivecapError::BackendTransient { .. })
    }

    /// Whether this error must end the whole session rather than degrade a
    /// single chunk.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LivecapError::BackendAuth { .. } | LivecapError::BackendQuota { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, LivecapError>;
