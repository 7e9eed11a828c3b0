//! Token fetcher interface

use std::future::Future;
use std::pin::Pin;

use common::{Secret, TenantId, TokenKind};

use crate::error::Result;

/// A freshly issued token as reported by the upstream.
///
/// `expires_in_secs` is a required part of the contract: every successful
/// fetch reports the remaining lifetime directly, so the pool can always
/// compute its refresh-ahead ratio without guessing. A fetcher for an
/// upstream that omits lifetime must supply its own policy internally.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Bearer token value, non-empty
    pub value: String,
    /// Seconds until expiry, counted from receipt; always positive
    pub expires_in_secs: u64,
}

/// The network exchange of an application secret for a bearer token.
///
/// A pure call: no caching, no retry, no storage — those belong to the
/// pool. Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn TokenFetcher>`).
pub trait TokenFetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        tenant: &'a TenantId,
        secret: &'a Secret<String>,
        kind: TokenKind,
    ) -> Pin<Box<dyn Future<Output = Result<IssuedToken>> + Send + 'a>>;
}
