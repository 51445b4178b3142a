//! Error Handling
//!
//! Unified error type for the orchestration layer.
//! Uses thiserror for ergonomic error definitions.

use panel_review_core::CoreError;
use thiserror::Error;

/// Orchestration-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors (unknown provider, missing credential, missing tier)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors (malformed request)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Every phase-1 provider failed; the message lists `provider: reason` pairs
    #[error("All providers failed: {0}")]
    AllProvidersFailed(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Errors surfaced by the core crate
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error was raised before any provider call was dispatched
    /// because of bad configuration.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Core(core) => core.is_configuration(),
            _ => false,
        }
    }
}

/// Convert AppError to a string for callers that only carry messages
impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
