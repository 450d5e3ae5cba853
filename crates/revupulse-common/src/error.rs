//! Error types for RevuPulse

use thiserror::Error;

/// Main error type for RevuPulse
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// A provider-level send failure. Carries the provider name so callers
    /// can tell transport errors apart from everything else.
    #[error("{provider} send failed: {message}")]
    Provider { provider: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for RevuPulse
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a provider error with an identifying prefix
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// True for transport failures the caller may retry
    pub fn is_provider_failure(&self) -> bool {
        matches!(self, Error::Provider { .. })
    }
}
