//! Error types for gemix

use thiserror::Error;

/// Main error type for gemix
#[derive(Error, Debug)]
pub enum GemixError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("TOML encode error: {0}")]
    TomlEncodeError(#[from] toml::ser::Error),

    #[error("TOML decode error: {0}")]
    TomlDecodeError(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// SSH dial or authentication failure
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Bad input detected before any remote call is made
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A process or port is already in use on a target host
    #[error("Conflict: {0}")]
    ConflictError(String),

    /// Non-zero exit or failed transfer on a remote host
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Config merge, encode or file write failure
    #[error("Generation error: {0}")]
    GenerationError(String),

    #[error("Command timed out after {0:?}: {1}")]
    Timeout(std::time::Duration, String),

    #[error("Rollback is not supported by task: {0}")]
    UnsupportedRollback(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Returned by lifecycle operations once every host has been attempted.
    /// Per-host failures are only reported through the log.
    #[error("{0} operation failed")]
    OperationFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for GemixError {
    fn from(err: anyhow::Error) -> Self {
        GemixError::Internal(err.to_string())
    }
}

impl GemixError {
    /// True for errors raised before any remote mutation happened
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            GemixError::ValidationError(_)
                | GemixError::ConnectionError(_)
                | GemixError::ConflictError(_)
        )
    }
}
