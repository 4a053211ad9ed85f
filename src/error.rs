//! # Error Module
//!
//! Unified error handling for the wavsplit crate.
//! Provides a central error type that wraps domain-specific errors.

use thiserror::Error;

use crate::config::ConfigError;
use crate::tools::ToolError;

/// Central error type for wavsplit operations.
#[derive(Debug, Error)]
pub enum SplitError {
    /// Configuration error
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// External tool could not be found or run
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// A batch or file run cannot start (missing input, no files, unwritable output)
    #[error("{0}")]
    Precondition(String),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SplitError {
    /// Create a precondition error with message
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Short label for the error category, used in notifications.
    pub fn kind(&self) -> &'static str {
        match self {
            SplitError::Config(_) => "config",
            SplitError::Tool(_) => "tool",
            SplitError::Precondition(_) => "precondition",
            SplitError::Io(_) => "io",
        }
    }
}

/// Result type alias using SplitError
pub type Result<T> = std::result::Result<T, SplitError>;
