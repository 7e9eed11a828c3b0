//! Token record and the refresh-ahead predicate

use serde::{Deserialize, Serialize};

/// One cached token for a `(tenant, kind)` key.
///
/// `issued_at` and `expires_at` are absolute unix timestamps in milliseconds,
/// computed at storage time from the upstream's `expires_in` delta plus the
/// receipt time. `expires_at > issued_at` always holds for a stored record;
/// the store rejects anything else at upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Bearer token value, never empty once stored
    pub value: String,
    /// When this value was obtained, unix millis
    pub issued_at: u64,
    /// When this value stops being accepted upstream, unix millis
    pub expires_at: u64,
}

impl TokenRecord {
    /// Whether the token is past its expiry at `now_millis`.
    pub fn is_expired(&self, now_millis: u64) -> bool {
        now_millis >= self.expires_at
    }

    /// Total lifetime in milliseconds.
    pub fn lifetime_millis(&self) -> u64 {
        self.expires_at.saturating_sub(self.issued_at)
    }

    /// Refresh-ahead policy: refresh once the remaining fraction of the
    /// token's lifetime drops below `threshold`.
    ///
    /// An expired record and a record with a degenerate (zero) lifetime both
    /// need refresh.
    pub fn needs_refresh(&self, now_millis: u64, threshold: f64) -> bool {
        if self.is_expired(now_millis) {
            return true;
        }
        let lifetime = self.lifetime_millis();
        if lifetime == 0 {
            return true;
        }
        let remaining = self.expires_at - now_millis;
        (remaining as f64) / (lifetime as f64) < threshold
    }
}
