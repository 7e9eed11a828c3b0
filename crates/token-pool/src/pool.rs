//! Pool orchestration: cache read, refresh-ahead, lock, fetch, persist
//!
//! `get_token` is the hot path: validate, one lock-free store read, and
//! return — the overwhelming majority of calls never see the lock. Only
//! keys inside the refresh-ahead window (or forced refreshes) take the
//! per-key lock, re-check the store, and go to the network.
//!
//! Single-flight: under N concurrent callers for the same empty or
//! expiring key, one caller wins the lock and fetches; the rest find the
//! fresh row in the double-check and return it without fetching.

use std::sync::Arc;

use common::{TenantId, TokenKind, unix_millis};
use issuer::{AppStatus, ApplicationRegistry, TokenFetcher};
use token_store::TokenStore;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::lock::RefreshLock;
use crate::retry::RetryPolicy;

/// Credential pool over one token store.
///
/// Holds no global state: the lock map, retry policy, and collaborator
/// handles are all owned by the instance. Cheap to share via `Arc`.
pub struct TokenPool {
    store: Arc<TokenStore>,
    registry: Arc<dyn ApplicationRegistry>,
    fetcher: Arc<dyn TokenFetcher>,
    locks: RefreshLock,
    retry: RetryPolicy,
    config: PoolConfig,
}

impl TokenPool {
    /// Create a pool. `config` should have been validated at startup.
    pub fn new(
        store: Arc<TokenStore>,
        registry: Arc<dyn ApplicationRegistry>,
        fetcher: Arc<dyn TokenFetcher>,
        config: PoolConfig,
    ) -> Self {
        let retry = config.retry_policy();
        Self {
            store,
            registry,
            fetcher,
            locks: RefreshLock::new(),
            retry,
            config,
        }
    }

    /// The backing store (for the background warmer and cleanup).
    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// The pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Get a valid token for `(tenant_id, kind)`, fetching or refreshing
    /// if needed. Never returns a value past its expiry.
    pub async fn get_token(
        &self,
        tenant_id: &str,
        kind: TokenKind,
        force_refresh: bool,
    ) -> Result<String> {
        let tenant = TenantId::parse(tenant_id).map_err(|e| Error::Validation(e.to_string()))?;

        if !force_refresh {
            // Lock-free fast path: valid and outside the refresh-ahead window
            if let Some(record) = self.store.get(&tenant, kind).await {
                if !record.needs_refresh(unix_millis(), self.config.refresh_ahead_ratio) {
                    metrics::counter!("token_pool_cache_hits_total", "kind" => kind.as_str())
                        .increment(1);
                    debug!(tenant = %tenant, kind = %kind, "cache hit");
                    return Ok(record.value);
                }
            }
        }

        self.refresh_internal(&tenant, kind, force_refresh).await
    }

    /// Obtain a fresh token, bypassing the cache.
    pub async fn refresh_token(&self, tenant_id: &str, kind: TokenKind) -> Result<String> {
        let tenant = TenantId::parse(tenant_id).map_err(|e| Error::Validation(e.to_string()))?;
        self.refresh_internal(&tenant, kind, true).await
    }

    /// Drop the cached token for `(tenant_id, kind)`.
    ///
    /// Idempotent: returns true iff a row was removed, false (not an
    /// error) when nothing was cached.
    pub async fn invalidate_token(&self, tenant_id: &str, kind: TokenKind) -> Result<bool> {
        let tenant = TenantId::parse(tenant_id).map_err(|e| Error::Validation(e.to_string()))?;
        let removed = self
            .store
            .remove(&tenant, kind)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;
        if removed {
            info!(tenant = %tenant, kind = %kind, "token invalidated");
        }
        Ok(removed)
    }

    /// Serialized refresh for one key.
    ///
    /// The guard drops on every exit path, so a fetch failure or panic
    /// can never leave the key locked.
    async fn refresh_internal(
        &self,
        tenant: &TenantId,
        kind: TokenKind,
        force: bool,
    ) -> Result<String> {
        let key = format!("{tenant}:{kind}");
        let _guard = self
            .locks
            .acquire(&key, self.config.lock_timeout())
            .await
            .map_err(|e| {
                metrics::counter!("token_pool_lock_timeouts_total").increment(1);
                Error::LockTimeout(e.to_string())
            })?;

        // Double-check: a concurrent caller may have refreshed this key
        // while we waited for the lock
        let cached = self.store.get(tenant, kind).await;
        if !force {
            if let Some(record) = &cached {
                if !record.needs_refresh(unix_millis(), self.config.refresh_ahead_ratio) {
                    metrics::counter!("token_pool_cache_hits_total", "kind" => kind.as_str())
                        .increment(1);
                    debug!(tenant = %tenant, kind = %kind, "refreshed by concurrent caller");
                    return Ok(record.value.clone());
                }
            }
        }

        let application = self
            .registry
            .get_application(tenant)
            .await
            .map_err(|e| Error::Storage(format!("application registry unavailable: {e}")))?
            .ok_or_else(|| Error::Authentication(format!("unknown application {tenant}")))?;
        if application.status != AppStatus::Active {
            return Err(Error::Authentication(format!(
                "application {tenant} is {}",
                application.status
            )));
        }

        let fetched = self
            .retry
            .run(|| self.fetcher.fetch(tenant, &application.secret, kind))
            .await;

        let issued = match fetched {
            Ok(issued) => issued,
            Err(e) => {
                metrics::counter!(
                    "token_pool_fetches_total",
                    "kind" => kind.as_str(),
                    "outcome" => "failure"
                )
                .increment(1);
                // A failed refresh-ahead is not an outage: the old row is
                // still valid, keep serving it until real expiry
                if !force {
                    if let Some(record) = cached {
                        if !record.is_expired(unix_millis()) {
                            warn!(
                                tenant = %tenant,
                                kind = %kind,
                                error = %e,
                                "refresh failed, serving cached token until expiry"
                            );
                            metrics::counter!("token_pool_stale_served_total", "kind" => kind.as_str())
                                .increment(1);
                            return Ok(record.value);
                        }
                    }
                }
                return Err(Error::Acquisition(e.to_string()));
            }
        };

        let now = unix_millis();
        let expires_at = now.saturating_add(issued.expires_in_secs.saturating_mul(1000));
        let record = self
            .store
            .upsert(tenant, kind, issued.value, now, expires_at)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        metrics::counter!(
            "token_pool_fetches_total",
            "kind" => kind.as_str(),
            "outcome" => "success"
        )
        .increment(1);
        info!(
            tenant = %tenant,
            kind = %kind,
            expires_in_secs = issued.expires_in_secs,
            "token refreshed"
        );
        Ok(record.value)
    }

    /// Pool summary for the health endpoint.
    pub async fn health(&self) -> serde_json::Value {
        let total = self.store.len().await;
        let needing_refresh = self
            .store
            .list_needing_refresh(self.config.refresh_ahead_ratio)
            .await
            .len();
        serde_json::json!({
            "status": "healthy",
            "tokens_total": total,
            "tokens_needing_refresh": needing_refresh,
        })
    }
}
