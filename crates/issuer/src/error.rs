//! Error types for issuer operations

use crate::classify::{ErrorClass, classify_status};

/// Errors from registry lookups and token fetches.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token endpoint returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("invalid application credentials: {0}")]
    InvalidCredentials(String),

    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    #[error("application registry error: {0}")]
    Registry(String),
}

impl Error {
    /// Whether a retry has any chance of succeeding.
    ///
    /// Network-level failures and retryable upstream statuses are transient;
    /// credential rejections, malformed responses, and registry failures are
    /// not and must surface on first occurrence.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(_) => true,
            Error::Upstream { status, .. } => classify_status(*status) == ErrorClass::Transient,
            Error::InvalidCredentials(_) | Error::MalformedResponse(_) | Error::Registry(_) => {
                false
            }
        }
    }
}

/// Result alias for issuer operations.
pub type Result<T> = std::result::Result<T, Error>;
