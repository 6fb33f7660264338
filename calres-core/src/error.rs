//! Error types for calres.

use thiserror::Error;

/// Errors that can occur while reconciling the resource and room cache.
#[derive(Error, Debug)]
pub enum CalresError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend temporarily unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend '{0}' is not registered")]
    BackendNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider '{0}' not found in PATH")]
    ProviderNotInstalled(String),

    #[error("Cache integrity error: {0}")]
    StoreIntegrity(String),

    #[error("Cache store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CalresError {
    /// Whether the next scheduled run is expected to succeed without intervention.
    pub fn is_transient(&self) -> bool {
        matches!(self, CalresError::BackendUnavailable(_))
    }
}

/// Result type alias for calres operations.
pub type CalresResult<T> = Result<T, CalresError>;
