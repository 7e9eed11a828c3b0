//! Proactive background refresh and housekeeping
//!
//! The warmer task periodically scans the store for tokens inside the
//! refresh-ahead window and refreshes them before any caller has to wait
//! on a fetch. It goes through `get_token`, so warm refreshes take the
//! same per-key lock as request-time refreshes and the two can never
//! fetch the same key twice.
//!
//! The cleanup task purges rows long past expiry. Neither task is
//! correctness-critical: a missed cycle just means the next request (or
//! the next cycle) does the work.

use std::sync::Arc;
use std::time::Duration;

use token_store::TokenStore;
use tracing::{debug, info, warn};

use crate::pool::TokenPool;

/// Spawn a task that refreshes expiring tokens every `interval`.
///
/// Failures are logged and left for the next cycle — a failed warm
/// refresh inside the validity window is invisible to callers.
///
/// Returns a `JoinHandle` for the spawned task.
pub fn spawn_refresh_task(pool: Arc<TokenPool>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick — the pool was just constructed
        ticker.tick().await;

        loop {
            ticker.tick().await;
            warm_cycle(&pool).await;
        }
    })
}

/// Spawn a task that purges rows expired longer than `retention`, every
/// `interval`.
pub fn spawn_cleanup_task(
    store: Arc<TokenStore>,
    interval: Duration,
    retention: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.cleanup_expired(retention).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "purged expired tokens"),
                Err(e) => warn!(error = %e, "cleanup cycle failed"),
            }
        }
    })
}

/// Run one warm cycle: refresh every token inside the refresh-ahead window.
async fn warm_cycle(pool: &TokenPool) {
    let threshold = pool.config().refresh_ahead_ratio;
    let due = pool.store().list_needing_refresh(threshold).await;
    if due.is_empty() {
        return;
    }
    debug!(due = due.len(), "warm cycle starting");

    for (tenant, kind, _) in due {
        match pool.get_token(tenant.as_str(), kind, false).await {
            Ok(_) => {}
            Err(e) => {
                warn!(
                    tenant = %tenant,
                    kind = %kind,
                    error = %e,
                    "background refresh failed, will retry next cycle"
                );
            }
        }
    }
}
