//! Error types used throughout Spool

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Spool
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum SpoolError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SpoolError {
    /// Shorthand for an [`SpoolError::InvalidArgument`] with a formatted message
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Shorthand for a [`SpoolError::Config`] with a formatted message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result type alias for Spool operations
pub type Result<T> = std::result::Result<T, SpoolError>;
