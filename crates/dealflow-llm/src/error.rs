//! Error types for dealflow-llm

use thiserror::Error;

/// Model layer error type
#[derive(Debug, Error)]
pub enum Error {
    /// Provider not configured
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// API error
    #[error("api error: {0}")]
    Api(String),

    /// Rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimit,

    /// Upstream server error (5xx)
    #[error("server error: {0}")]
    ServerError(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Invalid response payload
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Every provider in the fallback chain failed
    #[error("all {attempts} providers failed, last error: {last}")]
    AllProvidersFailed {
        /// Number of providers tried
        attempts: usize,
        /// Last provider's error message, preserved for diagnostics
        last: String,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
