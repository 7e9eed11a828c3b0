//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Application secrets never live in the TOML: each entry resolves its
//! secret from a `TOKEN_SECRET_<TENANT_ID>` environment variable or a
//! `secret_file` path, env var first.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::{Secret, TenantId};
use issuer::AppStatus;
use serde::Deserialize;
use token_pool::PoolConfig;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub store: StoreConfig,
    pub issuer: IssuerConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub warm: WarmConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub applications: Vec<AppEntry>,
}

/// Token snapshot location
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
}

/// Upstream token-issuing API
#[derive(Debug, Deserialize)]
pub struct IssuerConfig {
    pub base_url: String,
    #[serde(default = "default_issuer_timeout")]
    pub timeout_secs: u64,
}

/// Background warmer cadence
#[derive(Debug, Deserialize)]
pub struct WarmConfig {
    #[serde(default = "default_warm_interval")]
    pub interval_secs: u64,
}

impl Default for WarmConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_warm_interval(),
        }
    }
}

/// Expired-row purge cadence and retention window
#[derive(Debug, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_retention")]
    pub retention_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
            retention_secs: default_retention(),
        }
    }
}

/// One registered tenant application.
#[derive(Debug, Deserialize)]
pub struct AppEntry {
    pub tenant_id: String,
    pub status: AppStatus,
    /// Path to a file containing the secret (alternative to the
    /// TOKEN_SECRET_<TENANT_ID> env var)
    #[serde(default)]
    pub secret_file: Option<PathBuf>,
}

fn default_issuer_timeout() -> u64 {
    30
}

fn default_warm_interval() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    3600
}

fn default_retention() -> u64 {
    604_800 // 7 days
}

impl AppEntry {
    /// Environment variable holding this entry's secret:
    /// `TOKEN_SECRET_<TENANT_ID>` uppercased, `-` mapped to `_`.
    pub fn secret_env_var(&self) -> String {
        let suffix: String = self
            .tenant_id
            .chars()
            .map(|c| if c == '-' { '_' } else { c.to_ascii_uppercase() })
            .collect();
        format!("TOKEN_SECRET_{suffix}")
    }

    /// Resolve the secret: env var takes precedence over the file.
    pub fn resolve_secret(&self) -> common::Result<Secret<String>> {
        if let Ok(value) = std::env::var(self.secret_env_var()) {
            if !value.is_empty() {
                return Ok(Secret::new(value));
            }
        }
        if let Some(ref secret_file) = self.secret_file {
            let value = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read secret_file {} for {}: {e}",
                    secret_file.display(),
                    self.tenant_id
                ))
            })?;
            let value = value.trim().to_owned();
            if !value.is_empty() {
                return Ok(Secret::new(value));
            }
        }
        Err(common::Error::Config(format!(
            "no secret for application {}: set {} or secret_file",
            self.tenant_id,
            self.secret_env_var()
        )))
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        if !config.issuer.base_url.starts_with("http://")
            && !config.issuer.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "issuer.base_url must start with http:// or https://, got: {}",
                config.issuer.base_url
            )));
        }
        if config.issuer.timeout_secs == 0 {
            return Err(common::Error::Config(
                "issuer.timeout_secs must be greater than 0".into(),
            ));
        }
        if config.warm.interval_secs == 0 {
            return Err(common::Error::Config(
                "warm.interval_secs must be greater than 0".into(),
            ));
        }
        if config.cleanup.interval_secs == 0 {
            return Err(common::Error::Config(
                "cleanup.interval_secs must be greater than 0".into(),
            ));
        }
        config.pool.validate()?;

        // Tenant ids must parse, and must be unique
        let mut seen = std::collections::HashSet::new();
        for entry in &config.applications {
            let tenant = TenantId::parse(&entry.tenant_id)
                .map_err(|e| common::Error::Config(e.to_string()))?;
            if !seen.insert(tenant) {
                return Err(common::Error::Config(format!(
                    "duplicate application entry for {}",
                    entry.tenant_id
                )));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("token-warmer.toml")
    }

    pub fn warm_interval(&self) -> Duration {
        Duration::from_secs(self.warm.interval_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup.interval_secs)
    }

    pub fn cleanup_retention(&self) -> Duration {
        Duration::from_secs(self.cleanup.retention_secs)
    }

    pub fn issuer_timeout(&self) -> Duration {
        Duration::from_secs(self.issuer.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn valid_toml() -> &'static str {
        r#"
listen_addr = "127.0.0.1:8080"

[store]
path = "/var/lib/token-warmer/tokens.json"

[issuer]
base_url = "https://issuer.example.com"

[[applications]]
tenant_id = "cli-1"
status = "active"
"#
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_valid_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        let config = Config::load(&path).unwrap();
        assert_eq!(config.issuer.base_url, "https://issuer.example.com");
        assert_eq!(config.issuer.timeout_secs, 30);
        assert_eq!(config.warm.interval_secs, 60);
        assert_eq!(config.cleanup.retention_secs, 604_800);
        assert_eq!(config.pool.refresh_ahead_ratio, 0.1);
        assert_eq!(config.applications.len(), 1);
        assert_eq!(config.applications[0].status, AppStatus::Active);
    }

    #[test]
    fn missing_file_errors() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn rejects_non_http_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &valid_toml().replace("https://issuer.example.com", "ftp://issuer.example.com"),
        );
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn rejects_duplicate_applications() {
        let dir = tempfile::tempdir().unwrap();
        let mut contents = valid_toml().to_owned();
        contents.push_str("\n[[applications]]\ntenant_id = \"cli-1\"\nstatus = \"inactive\"\n");
        let path = write_config(&dir, &contents);
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn rejects_malformed_tenant_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &valid_toml().replace("cli-1", "not a tenant id"),
        );
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn rejects_bad_pool_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut contents = valid_toml().to_owned();
        contents.push_str("\n[pool]\nrefresh_ahead_ratio = 1.5\n");
        let path = write_config(&dir, &contents);
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn secret_env_var_name_is_uppercased() {
        let entry = AppEntry {
            tenant_id: "cli-app-1".into(),
            status: AppStatus::Active,
            secret_file: None,
        };
        assert_eq!(entry.secret_env_var(), "TOKEN_SECRET_CLI_APP_1");
    }

    #[test]
    fn secret_from_env_wins_over_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("secret");
        std::fs::write(&secret_path, "from-file\n").unwrap();

        let entry = AppEntry {
            tenant_id: "envtest".into(),
            status: AppStatus::Active,
            secret_file: Some(secret_path),
        };

        unsafe { set_env("TOKEN_SECRET_ENVTEST", "from-env") };
        let secret = entry.resolve_secret().unwrap();
        assert_eq!(secret.expose_str(), "from-env");
        unsafe { remove_env("TOKEN_SECRET_ENVTEST") };
    }

    #[test]
    fn secret_from_file_is_trimmed() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("secret");
        std::fs::write(&secret_path, "  s3cret \n").unwrap();

        let entry = AppEntry {
            tenant_id: "filetest".into(),
            status: AppStatus::Active,
            secret_file: Some(secret_path),
        };
        unsafe { remove_env("TOKEN_SECRET_FILETEST") };

        let secret = entry.resolve_secret().unwrap();
        assert_eq!(secret.expose_str(), "s3cret");
    }

    #[test]
    fn missing_secret_is_a_config_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let entry = AppEntry {
            tenant_id: "nosecret".into(),
            status: AppStatus::Active,
            secret_file: None,
        };
        unsafe { remove_env("TOKEN_SECRET_NOSECRET") };

        let err = entry.resolve_secret().unwrap_err();
        assert!(err.to_string().contains("TOKEN_SECRET_NOSECRET"));
    }

    #[test]
    fn resolve_path_prefers_cli() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/from/env.toml") };
        assert_eq!(
            Config::resolve_path(Some("/from/cli.toml")),
            PathBuf::from("/from/cli.toml")
        );
        assert_eq!(Config::resolve_path(None), PathBuf::from("/from/env.toml"));
        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(
            Config::resolve_path(None),
            PathBuf::from("token-warmer.toml")
        );
    }
}
