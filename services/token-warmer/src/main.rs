//! Token warmer daemon
//!
//! Single-binary service that:
//! 1. Loads the application registry and pool configuration from TOML
//! 2. Owns a credential pool over the configured token store
//! 3. Proactively refreshes expiring tokens in the background
//! 4. Purges rows long past expiry
//! 5. Serves /health and /metrics for operations

mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use common::TenantId;
use issuer::{Application, HttpTokenFetcher, StaticRegistry};
use token_pool::{TokenPool, spawn_cleanup_task, spawn_refresh_task};
use token_store::TokenStore;

use crate::config::Config;

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    pool: Arc<TokenPool>,
    prometheus: PrometheusHandle,
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The handle's `render()` method produces the Prometheus text exposition
/// format served on `/metrics`. The pool's counters register themselves on
/// first use once the recorder is installed.
fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Build the axum router with the two operational endpoints.
fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting token-warmer");

    // Install the metrics recorder before any counters are emitted
    let prometheus = install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.listen_addr,
        issuer = %config.issuer.base_url,
        applications = config.applications.len(),
        "configuration loaded"
    );

    // Registry from config entries, secrets resolved env-first
    let registry = StaticRegistry::new();
    for entry in &config.applications {
        let tenant: TenantId = entry
            .tenant_id
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        let secret = entry.resolve_secret()?;
        registry
            .insert(
                tenant,
                Application {
                    secret,
                    status: entry.status,
                },
            )
            .await;
    }

    let client = reqwest::Client::builder()
        .timeout(config.issuer_timeout())
        .build()
        .context("failed to build HTTP client")?;
    let fetcher = Arc::new(HttpTokenFetcher::new(client, config.issuer.base_url.clone()));

    let store = Arc::new(
        TokenStore::load(config.store.path.clone())
            .await
            .context("failed to load token store")?,
    );

    let pool = Arc::new(TokenPool::new(
        store.clone(),
        Arc::new(registry),
        fetcher,
        config.pool.clone(),
    ));

    let warm_handle = spawn_refresh_task(pool.clone(), config.warm_interval());
    let cleanup_handle =
        spawn_cleanup_task(store, config.cleanup_interval(), config.cleanup_retention());
    info!(
        warm_interval_secs = config.warm.interval_secs,
        cleanup_interval_secs = config.cleanup.interval_secs,
        "background tasks started"
    );

    let state = AppState { pool, prometheus };
    let router = build_router(state);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    warm_handle.abort();
    cleanup_handle.abort();
    info!("shutdown complete");
    Ok(())
}

/// Resolve on ctrl-c; axum drains in-flight requests before returning.
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

/// GET /health — pool summary with token counts.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.pool.health().await;
    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        health.to_string(),
    )
}

/// GET /metrics — Prometheus text exposition.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.prometheus.render()
}
