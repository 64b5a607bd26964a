use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DuoError {
    #[error("Lock on {} not acquired within {waited_ms}ms", path.display())]
    LockTimeout { path: PathBuf, waited_ms: u64 },

    #[error("State validation failed: {0}")]
    Validation(String),

    #[error("Session state corrupted beyond recovery: {0}")]
    CorruptedState(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl DuoError {
    /// Lock timeouts are the one failure a caller is expected to retry;
    /// everything else is either resolved locally or needs an operator.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, DuoError>;
