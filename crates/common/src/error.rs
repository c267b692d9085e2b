//! Common error types for the endpoint healthcheck crates.

use std::fmt;

/// A specialized Result type for healthcheck operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for healthcheck operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Healthcheck error: {0}")]
    Healthcheck(String),

    /// A core invariant was violated; never caused by an external condition.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new healthcheck error.
    pub fn healthcheck(msg: impl fmt::Display) -> Self {
        Error::Healthcheck(msg.to_string())
    }

    /// Create a new internal error.
    pub fn internal(msg: impl fmt::Display) -> Self {
        Error::Internal(msg.to_string())
    }

    /// Whether this error must halt the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::config("interval missing").to_string(),
            "Configuration error: interval missing"
        );
        assert_eq!(
            Error::internal("worker panicked").to_string(),
            "Internal error: worker panicked"
        );
    }

    #[test]
    fn test_only_internal_errors_are_fatal() {
        assert!(Error::internal("boom").is_fatal());
        assert!(!Error::config("bad").is_fatal());
        assert!(!Error::healthcheck("down").is_fatal());
    }
}
