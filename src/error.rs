//! Error types for Tollgate.

use thiserror::Error;

/// Main error type for Tollgate operations.
#[derive(Error, Debug)]
pub enum TollgateError {
    /// A limiter is already registered under this key
    #[error("rate limiter key already exists: {key}")]
    AlreadyExists { key: String },

    /// No limiter is registered under this key
    #[error("rate limiter key does not exist: {key}")]
    NotFound { key: String },

    /// Rate must be a finite number greater than zero
    #[error("invalid rate {rate} for limiter {key}: must be finite and greater than zero")]
    InvalidRate { key: String, rate: f64 },

    /// Burst must allow at least one token
    #[error("invalid burst {burst} for limiter {key}: must be at least 1")]
    InvalidBurst { key: String, burst: u32 },

    /// The request scope was cancelled while waiting for a token
    #[error("wait for rate limiter token was cancelled")]
    Cancelled,

    /// The request scope deadline passed, or would pass before a token accrues
    #[error("deadline exceeded while waiting for rate limiter token")]
    DeadlineExceeded,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TollgateError {
    /// Whether this error comes from an aborted token wait.
    pub fn is_aborted(&self) -> bool {
        matches!(self, TollgateError::Cancelled | TollgateError::DeadlineExceeded)
    }
}

impl From<config::ConfigError> for TollgateError {
    fn from(e: config::ConfigError) -> Self {
        TollgateError::Config(e.to_string())
    }
}

/// Result type alias for Tollgate operations.
pub type Result<T> = std::result::Result<T, TollgateError>;
