use thiserror::Error;

use crate::provider::Provider;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No images found")]
    NotFound,

    #[error("Invalid cloud provider: {0}")]
    InvalidProvider(String),

    #[error("Failed to fetch {provider} image data: {reason}")]
    FetchFailure { provider: Provider, reason: String },

    #[error("Malformed {provider} record: {reason}")]
    MalformedRecord { provider: Provider, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Shorthand for a fetch failure
    pub fn fetch(provider: Provider, reason: impl Into<String>) -> Self {
        Error::FetchFailure {
            provider,
            reason: reason.into(),
        }
    }

    /// Shorthand for a malformed record
    pub fn malformed(provider: Provider, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            provider,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
