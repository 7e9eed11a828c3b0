//! Pool configuration
//!
//! Deserialized from the service's TOML config; every field has a default
//! so an empty `[pool]` table is a valid configuration. `validate()` is
//! called once at startup — past that point the pool trusts its config.

use std::time::Duration;

use serde::Deserialize;

use crate::retry::RetryPolicy;

/// Retry/backoff settings for the upstream fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first (not "retries after")
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

/// Credential pool settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Refresh once remaining/lifetime drops below this fraction
    #[serde(default = "default_refresh_ahead_ratio")]
    pub refresh_ahead_ratio: f64,
    /// Bound on waiting for a concurrent refresher of the same key
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            refresh_ahead_ratio: default_refresh_ahead_ratio(),
            lock_timeout_secs: default_lock_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_refresh_ahead_ratio() -> f64 {
    0.1
}

fn default_lock_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_jitter() -> bool {
    true
}

impl PoolConfig {
    /// Reject configurations the pool cannot run with.
    pub fn validate(&self) -> common::Result<()> {
        if !self.refresh_ahead_ratio.is_finite()
            || self.refresh_ahead_ratio <= 0.0
            || self.refresh_ahead_ratio >= 1.0
        {
            return Err(common::Error::Config(format!(
                "refresh_ahead_ratio must be in (0, 1), got {}",
                self.refresh_ahead_ratio
            )));
        }
        if self.lock_timeout_secs == 0 {
            return Err(common::Error::Config(
                "lock_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(common::Error::Config(
                "retry.max_attempts must be greater than 0".into(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(common::Error::Config(format!(
                "retry.base_delay_ms {} exceeds retry.max_delay_ms {}",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    /// Build the retry policy for the fetch path.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            jitter: self.retry.jitter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PoolConfig::default();
        config.validate().unwrap();
        assert_eq!(config.refresh_ahead_ratio, 0.1);
        assert_eq!(config.lock_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn empty_toml_table_uses_defaults() {
        let config: PoolConfig = toml::from_str("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.retry.base_delay_ms, 500);
        assert!(config.retry.jitter);
    }

    #[test]
    fn partial_toml_overrides() {
        let config: PoolConfig = toml::from_str(
            r#"
            refresh_ahead_ratio = 0.25
            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.refresh_ahead_ratio, 0.25);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.max_delay_ms, 10_000);
    }

    #[test]
    fn rejects_out_of_range_ratio() {
        for ratio in [0.0, 1.0, -0.5, f64::NAN] {
            let config = PoolConfig {
                refresh_ahead_ratio: ratio,
                ..PoolConfig::default()
            };
            assert!(config.validate().is_err(), "should reject ratio {ratio}");
        }
    }

    #[test]
    fn rejects_zero_lock_timeout_and_attempts() {
        let config = PoolConfig {
            lock_timeout_secs: 0,
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PoolConfig {
            retry: RetryConfig {
                max_attempts: 0,
                ..RetryConfig::default()
            },
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_delay_bounds() {
        let config = PoolConfig {
            retry: RetryConfig {
                base_delay_ms: 20_000,
                max_delay_ms: 10_000,
                ..RetryConfig::default()
            },
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
