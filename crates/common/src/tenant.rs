//! Tenant identity and token kind
//!
//! `TenantId` is the caller-boundary validated identifier for a tenant
//! application. Validation happens once, at parse time; everything past the
//! pool's entry points works with the already-checked newtype. The character
//! set deliberately excludes `:` so the id can be embedded in composite
//! store keys without escaping.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum accepted tenant id length.
pub const MAX_TENANT_ID_LEN: usize = 64;

/// Rejected tenant id, with the reason validation failed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid tenant id: {reason}")]
pub struct InvalidTenantId {
    pub reason: String,
}

/// String that names neither token kind.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown token kind: {0:?}")]
pub struct InvalidTokenKind(pub String);

/// Validated tenant application identifier.
///
/// Accepted form: 1..=64 characters from `[A-Za-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
    /// Validate and wrap a raw tenant id.
    pub fn parse(raw: &str) -> Result<Self, InvalidTenantId> {
        if raw.is_empty() {
            return Err(InvalidTenantId {
                reason: "must not be empty".into(),
            });
        }
        if raw.len() > MAX_TENANT_ID_LEN {
            return Err(InvalidTenantId {
                reason: format!("exceeds {MAX_TENANT_ID_LEN} characters"),
            });
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != '-')
        {
            return Err(InvalidTenantId {
                reason: format!("contains disallowed character {bad:?}"),
            });
        }
        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TenantId {
    type Err = InvalidTenantId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The two classes of bearer credential issued by the upstream API,
/// cached independently per tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Application-level token, shared across all of the app's tenants
    App,
    /// Tenant-level token, scoped to one installation of the app
    Tenant,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::App => "app",
            TokenKind::Tenant => "tenant",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = InvalidTokenKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "app" => Ok(TokenKind::App),
            "tenant" => Ok(TokenKind::Tenant),
            other => Err(InvalidTokenKind(other.to_owned())),
        }
    }
}
