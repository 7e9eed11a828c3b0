//! Application registry interface
//!
//! The registry is the source of truth for "may this tenant fetch tokens
//! at all, and with which secret". The pool treats it as read-only: a
//! missing or non-active application is an immediate authentication
//! failure, never something to retry.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use common::{Secret, TenantId};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::Result;

/// Registration status of a tenant application.
///
/// Only `Active` applications may have tokens fetched. `Inactive` and
/// `Deleted` are distinct states upstream but identical from the pool's
/// perspective: fail fast, no fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppStatus {
    Active,
    Inactive,
    Deleted,
}

impl AppStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatus::Active => "active",
            AppStatus::Inactive => "inactive",
            AppStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registered tenant application, as the pool sees it.
///
/// The secret arrives already decrypted; `Secret` keeps it out of logs.
#[derive(Debug, Clone)]
pub struct Application {
    pub secret: Secret<String>,
    pub status: AppStatus,
}

/// Read-only lookup of tenant applications.
///
/// Returns `Ok(None)` for an unknown tenant. An `Err` means the registry
/// backend itself is unavailable — a different failure from "this tenant
/// does not exist", and the pool reports it differently too.
pub trait ApplicationRegistry: Send + Sync {
    fn get_application<'a>(
        &'a self,
        tenant: &'a TenantId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Application>>> + Send + 'a>>;
}

/// In-memory registry loaded from service configuration.
///
/// Entries can be replaced at runtime (config reload); lookups clone the
/// entry out so readers never hold the lock across an await.
pub struct StaticRegistry {
    apps: RwLock<HashMap<String, Application>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self {
            apps: RwLock::new(HashMap::new()),
        }
    }

    /// Add or replace an application entry.
    pub async fn insert(&self, tenant: TenantId, application: Application) {
        let mut apps = self.apps.write().await;
        apps.insert(tenant.as_str().to_owned(), application);
    }

    /// Remove an application entry. Returns true iff one existed.
    pub async fn remove(&self, tenant: &TenantId) -> bool {
        let mut apps = self.apps.write().await;
        apps.remove(tenant.as_str()).is_some()
    }

    /// Number of registered applications.
    pub async fn len(&self) -> usize {
        let apps = self.apps.read().await;
        apps.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for StaticRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationRegistry for StaticRegistry {
    fn get_application<'a>(
        &'a self,
        tenant: &'a TenantId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Application>>> + Send + 'a>> {
        Box::pin(async move {
            let apps = self.apps.read().await;
            Ok(apps.get(tenant.as_str()).cloned())
        })
    }
}
