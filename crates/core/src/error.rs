//! Core Error Types
//!
//! Defines the foundational error types used across the Panel Review workspace.
//! These error types are dependency-free (only thiserror + std) to keep the core
//! crate lightweight.
//!
//! The main crate extends these with pipeline-level variants (e.g.
//! `AllProvidersFailed`) that only make sense once providers are dispatched.

use thiserror::Error;

/// Core error type for the Panel Review workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration errors (missing credential, missing model tier, bad URL)
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The message without the variant prefix, for wrapping in another error.
    pub fn reason(&self) -> String {
        match self {
            Self::Config(m)
            | Self::Validation(m)
            | Self::Parse(m)
            | Self::Internal(m) => m.clone(),
            other => other.to_string(),
        }
    }

    /// Whether this error must abort before any provider call is dispatched.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
