//! Error types for dealflow-core
//!
//! Only a small closed set of errors ever reaches the caller; everything
//! recoverable (tool failures, provider exhaustion mid-run) is folded into a
//! well-formed run result instead.

use thiserror::Error;
use uuid::Uuid;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid runtime construction, such as an empty provider list
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The call context carries no usable tenant id
    #[error("call context has no tenant id")]
    TenantNotResolved,

    /// Resume was requested for a run that is not paused
    #[error("no paused run with id {0}")]
    RunNotFound(Uuid),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
