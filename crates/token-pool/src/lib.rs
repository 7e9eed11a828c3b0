//! Credential pool for tenant application tokens
//!
//! Caches short-lived bearer tokens per `(tenant, kind)` key, refreshes
//! them proactively before expiry, and collapses concurrent refreshes for
//! the same key into a single upstream fetch. The token store is the
//! single source of truth for token data; the pool owns the refresh lock
//! and the retry policy around the fetch.
//!
//! Token lifecycle per key:
//! 1. First `get_token` finds no row → lock → fetch → upsert → `Valid`
//! 2. Requests inside 90% of the lifetime hit the lock-free fast path
//! 3. Remaining lifetime drops under the refresh-ahead threshold → next
//!    request (or the background warmer) refreshes in place
//! 4. Refresh failure before real expiry keeps serving the old value;
//!    failure after expiry surfaces to the caller
//! 5. `invalidate_token` removes the row; housekeeping purges rows long
//!    past expiry

pub mod config;
pub mod error;
pub mod lock;
pub mod pool;
pub mod refresh;
pub mod retry;

pub use config::{PoolConfig, RetryConfig};
pub use error::{Error, Result};
pub use lock::{AcquireTimeout, RefreshGuard, RefreshLock};
pub use pool::TokenPool;
pub use refresh::{spawn_cleanup_task, spawn_refresh_task};
pub use retry::RetryPolicy;
