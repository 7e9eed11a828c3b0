//! Error types for pool operations

/// Errors surfaced by the credential pool.
///
/// The pool never fabricates a token value and never masks these behind a
/// stale token: a value is returned only when it is genuinely before its
/// expiry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed tenant id; checked before any lock or network work
    #[error("invalid tenant id: {0}")]
    Validation(String),

    /// Tenant unknown or not active; never retried
    #[error("application not authorized: {0}")]
    Authentication(String),

    /// The fetch ultimately failed (retry budget exhausted or fatal)
    #[error("token acquisition failed: {0}")]
    Acquisition(String),

    /// Could not serialize with a concurrent refresher in time
    #[error("refresh lock timeout: {0}")]
    LockTimeout(String),

    /// The persistence layer (or registry backend) is unavailable
    #[error("token storage unavailable: {0}")]
    Storage(String),
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
