use thiserror::Error;

/// Errors returned by conversion providers and the gateway built on them.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No API credential was configured for the active provider.
    #[error("provider API key is not configured")]
    NotConfigured,

    /// The request never produced a usable response (connect failure,
    /// timeout, broken body stream, ...).
    #[error("HTTP request to provider failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status code.
    #[error("provider responded with HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    /// The provider answered, but the payload did not have the shape we rely on.
    #[error("malformed provider response: {message}")]
    Malformed { message: String },

    /// The remote job reached its error state.
    #[error("conversion job failed: {message}")]
    JobFailed { message: String },

    /// Reading the staged upload from disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        ProviderError::Malformed { message: message.into() }
    }
}

/// Errors raised while writing an incoming upload into the staging area.
#[derive(Debug, Error)]
pub enum StagingError {
    /// The upload grew past the configured ceiling.
    #[error("upload exceeds the maximum of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("staging I/O error: {0}")]
    Io(#[from] std::io::Error),
}
