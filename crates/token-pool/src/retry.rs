//! Retrying fetch executor
//!
//! Runs a fetch operation up to `max_attempts` times with exponential
//! backoff. Only transient failures consume the retry budget; fatal ones
//! (rejected credentials, malformed responses) propagate on first
//! occurrence. Jitter spreads the delays of callers that failed at the
//! same moment, so they don't all come back at once.

use std::future::Future;
use std::time::Duration;

use rand::RngExt;
use tracing::{debug, error, warn};

/// Exponential backoff retry executor for token fetches.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Run `operation` until it succeeds, fails fatally, or the attempt
    /// budget is exhausted. Returns the last error in the latter cases.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> issuer::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = issuer::Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "fetch succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient fetch failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(attempt, error = %e, "fetch failed terminally");
                    return Err(e);
                }
            }
        }
    }

    /// Delay before the attempt following `attempt` (1-based):
    /// `base * 2^(attempt-1)`, capped, optionally jittered to 50-100%.
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let millis = delay.as_millis() as u64;
        let jittered = millis / 2 + rand::rng().random_range(0..=millis.div_ceil(2));
        Duration::from_millis(jittered)
    }
}
