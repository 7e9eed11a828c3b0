//! HTTP token fetcher
//!
//! Exchanges an application secret for a bearer token against the upstream
//! issuing API. Both token kinds POST the same JSON credentials body to a
//! per-kind endpoint under the configured base URL.
//!
//! Failure mapping: connection-level errors are transient; 401/403 mean
//! the secret was rejected (fatal); other non-2xx statuses carry their
//! status for classification; a 2xx body that doesn't decode into a
//! non-empty token with a positive lifetime is malformed (fatal).

use std::future::Future;
use std::pin::Pin;

use common::{Secret, TenantId, TokenKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::fetch::{IssuedToken, TokenFetcher};

/// Endpoint path for app-level tokens.
pub const APP_TOKEN_PATH: &str = "/v1/auth/app_token";

/// Endpoint path for tenant-level tokens.
pub const TENANT_TOKEN_PATH: &str = "/v1/auth/tenant_token";

/// Credentials body sent to the token endpoint.
#[derive(Serialize)]
struct TokenRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

/// Response from the token endpoint for both kinds.
///
/// `expires_in` is a delta in seconds from the response time. The pool
/// converts this to an absolute unix millisecond timestamp when storing.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Seconds until the token expires (delta, not absolute)
    pub expires_in: u64,
}

/// reqwest-backed `TokenFetcher`.
pub struct HttpTokenFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTokenFetcher {
    /// Create a fetcher against `base_url` (scheme + host, no trailing slash
    /// needed — one is trimmed if present).
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    /// Full endpoint URL for a token kind.
    fn endpoint(&self, kind: TokenKind) -> String {
        let path = match kind {
            TokenKind::App => APP_TOKEN_PATH,
            TokenKind::Tenant => TENANT_TOKEN_PATH,
        };
        format!("{}{}", self.base_url, path)
    }

    async fn fetch_inner(
        &self,
        tenant: &TenantId,
        secret: &Secret<String>,
        kind: TokenKind,
    ) -> Result<IssuedToken> {
        let url = self.endpoint(kind);
        debug!(tenant = %tenant, kind = %kind, "requesting token");

        let response = self
            .client
            .post(&url)
            .json(&TokenRequest {
                app_id: tenant.as_str(),
                app_secret: secret.expose_str(),
            })
            .send()
            .await
            .map_err(|e| Error::Http(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));

            // 401/403 means the application secret is revoked or wrong
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(Error::InvalidCredentials(format!(
                    "token endpoint rejected {tenant} ({status}): {body}"
                )));
            }

            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(format!("invalid token response: {e}")))?;

        if parsed.access_token.is_empty() {
            return Err(Error::MalformedResponse("empty access_token".into()));
        }
        if parsed.expires_in == 0 {
            return Err(Error::MalformedResponse("zero expires_in".into()));
        }

        Ok(IssuedToken {
            value: parsed.access_token,
            expires_in_secs: parsed.expires_in,
        })
    }
}

impl TokenFetcher for HttpTokenFetcher {
    fn fetch<'a>(
        &'a self,
        tenant: &'a TenantId,
        secret: &'a Secret<String>,
        kind: TokenKind,
    ) -> Pin<Box<dyn Future<Output = Result<IssuedToken>> + Send + 'a>> {
        Box::pin(self.fetch_inner(tenant, secret, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_deserializes() {
        let json = r#"{"access_token":"t-abc","expires_in":7200}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "t-abc");
        assert_eq!(token.expires_in, 7200);
    }

    #[test]
    fn token_request_serializes_credentials() {
        let body = serde_json::to_string(&TokenRequest {
            app_id: "cli-1",
            app_secret: "s3cret",
        })
        .unwrap();
        assert!(body.contains("\"app_id\":\"cli-1\""));
        assert!(body.contains("\"app_secret\":\"s3cret\""));
    }

    #[test]
    fn endpoint_varies_by_kind() {
        let fetcher = HttpTokenFetcher::new(reqwest::Client::new(), "https://issuer.example.com");
        assert_eq!(
            fetcher.endpoint(TokenKind::App),
            "https://issuer.example.com/v1/auth/app_token"
        );
        assert_eq!(
            fetcher.endpoint(TokenKind::Tenant),
            "https://issuer.example.com/v1/auth/tenant_token"
        );
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let fetcher = HttpTokenFetcher::new(reqwest::Client::new(), "https://issuer.example.com/");
        assert_eq!(
            fetcher.endpoint(TokenKind::App),
            "https://issuer.example.com/v1/auth/app_token"
        );
    }
}
