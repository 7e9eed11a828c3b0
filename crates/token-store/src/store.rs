//! JSON-file-backed token store
//!
//! A tokio Mutex serializes mutations from request-time refresh and the
//! background warmer; reads briefly take the lock to clone the row they
//! want. Every mutation writes the whole snapshot atomically (temp file +
//! rename, 0600 permissions) since it holds live bearer tokens.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::{TenantId, TokenKind, unix_millis};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::record::TokenRecord;

/// Compose the snapshot key for a `(tenant, kind)` pair.
///
/// `TenantId` forbids `:`, so the separator is unambiguous.
fn encode_key(tenant: &TenantId, kind: TokenKind) -> String {
    format!("{tenant}:{kind}")
}

/// Split a snapshot key back into its `(tenant, kind)` pair.
///
/// Rows with keys that no longer parse (hand-edited file) are skipped by
/// the batch queries rather than failing the whole scan.
fn decode_key(key: &str) -> Option<(TenantId, TokenKind)> {
    let (tenant, kind) = key.split_once(':')?;
    Some((tenant.parse().ok()?, kind.parse().ok()?))
}

/// Thread-safe token file manager.
///
/// At most one live row exists per `(tenant, kind)`: refresh goes through
/// `upsert`, which replaces the row in place rather than accumulating
/// history.
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    state: Mutex<HashMap<String, TokenRecord>>,
}

impl TokenStore {
    /// Load the snapshot from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` (cold start with zero
    /// tokens).
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading token file: {e}")))?;
            let records: HashMap<String, TokenRecord> = serde_json::from_str(&contents)
                .map_err(|e| Error::Parse(format!("parsing token file: {e}")))?;
            info!(path = %path.display(), tokens = records.len(), "loaded token snapshot");
            records
        } else {
            info!(path = %path.display(), "token file not found, starting with empty store");
            let records = HashMap::new();
            write_atomic(&path, &records).await?;
            records
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Get a clone of the row for `(tenant, kind)`, expired or not.
    ///
    /// Freshness decisions belong to the caller; the store only answers
    /// what is currently persisted.
    pub async fn get(&self, tenant: &TenantId, kind: TokenKind) -> Option<TokenRecord> {
        let state = self.state.lock().await;
        state.get(&encode_key(tenant, kind)).cloned()
    }

    /// Insert or replace the row for `(tenant, kind)` and persist to disk.
    ///
    /// Rejects empty values and non-positive lifetimes before anything is
    /// written. Returns the stored record.
    pub async fn upsert(
        &self,
        tenant: &TenantId,
        kind: TokenKind,
        value: String,
        issued_at: u64,
        expires_at: u64,
    ) -> Result<TokenRecord> {
        if value.is_empty() {
            return Err(Error::InvalidRecord(format!(
                "empty token value for {tenant}:{kind}"
            )));
        }
        if expires_at <= issued_at {
            return Err(Error::InvalidRecord(format!(
                "expires_at {expires_at} not after issued_at {issued_at} for {tenant}:{kind}"
            )));
        }

        let record = TokenRecord {
            value,
            issued_at,
            expires_at,
        };
        let mut state = self.state.lock().await;
        state.insert(encode_key(tenant, kind), record.clone());
        debug!(tenant = %tenant, kind = %kind, "upserted token");
        write_atomic(&self.path, &state).await?;
        Ok(record)
    }

    /// Remove the row for `(tenant, kind)` and persist to disk.
    ///
    /// Returns true iff a row was removed; a missing row is not an error.
    pub async fn remove(&self, tenant: &TenantId, kind: TokenKind) -> Result<bool> {
        let mut state = self.state.lock().await;
        let removed = state.remove(&encode_key(tenant, kind)).is_some();
        if removed {
            debug!(tenant = %tenant, kind = %kind, "removed token");
            write_atomic(&self.path, &state).await?;
        }
        Ok(removed)
    }

    /// Rows inside the refresh-ahead window, for the background warmer.
    ///
    /// Uses the same fraction-of-lifetime predicate as the request path.
    pub async fn list_needing_refresh(
        &self,
        threshold: f64,
    ) -> Vec<(TenantId, TokenKind, TokenRecord)> {
        let now = unix_millis();
        let state = self.state.lock().await;
        state
            .iter()
            .filter(|(_, record)| record.needs_refresh(now, threshold))
            .filter_map(|(key, record)| {
                let (tenant, kind) = decode_key(key)?;
                Some((tenant, kind, record.clone()))
            })
            .collect()
    }

    /// Purge rows expired for longer than `retention`. Housekeeping only;
    /// an expired row that survives a cycle is refreshed in place on the
    /// next request anyway.
    ///
    /// Returns the number of rows removed.
    pub async fn cleanup_expired(&self, retention: Duration) -> Result<usize> {
        let cutoff = unix_millis().saturating_sub(retention.as_millis() as u64);
        let mut state = self.state.lock().await;
        let before = state.len();
        state.retain(|_, record| record.expires_at > cutoff);
        let removed = before - state.len();
        if removed > 0 {
            info!(removed, "purged expired tokens");
            write_atomic(&self.path, &state).await?;
        }
        Ok(removed)
    }

    /// Number of stored rows.
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Write the snapshot to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 since the file contains live
/// bearer tokens.
async fn write_atomic(path: &Path, data: &HashMap<String, TokenRecord>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Parse(format!("serializing token snapshot: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("token file path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".tokens.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted token snapshot");
    Ok(())
}
