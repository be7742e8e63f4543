//! Service context: configuration plus the per-process caches.
//!
//! The service password and the read caches were process globals in earlier
//! designs; here they are explicit state threaded through a
//! [`ServiceContext`] handle so nothing hides in a singleton.

use crate::errors::{FedsvcError, Result};
use crate::service::admin::AdminRoster;
use crate::service::service::Service;
use crate::store::{Bucket, ObjectStore};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

/// Capacity of each service-info cache. The records are tiny and change
/// rarely; the caches exist to keep hot reads off the object store.
const CACHE_CAPACITY: usize = 5;

/// Process configuration for the service layer.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// The service password that unlocks private key material. Operations
    /// that need private access fail immediately when it is absent.
    pub password: Option<String>,
}

impl ServiceConfig {
    /// Read the configuration from the process environment
    /// (`SERVICE_PASSWORD`).
    pub fn from_env() -> ServiceConfig {
        ServiceConfig {
            password: std::env::var("SERVICE_PASSWORD").ok(),
        }
    }

    pub fn with_password(password: &str) -> ServiceConfig {
        ServiceConfig {
            password: Some(password.to_string()),
        }
    }
}

pub(crate) struct ServiceCaches {
    pub service_data: LruCache<String, serde_json::Value>,
    pub service_object: LruCache<bool, Service>,
    pub admin_users: LruCache<String, AdminRoster>,
    pub account_uid: LruCache<String, String>,
}

impl ServiceCaches {
    fn new() -> ServiceCaches {
        let capacity = NonZeroUsize::new(CACHE_CAPACITY)
            .unwrap_or(NonZeroUsize::MIN);
        ServiceCaches {
            service_data: LruCache::new(capacity),
            service_object: LruCache::new(capacity),
            admin_users: LruCache::new(capacity),
            account_uid: LruCache::new(capacity),
        }
    }

    fn clear(&mut self) {
        self.service_data.clear();
        self.service_object.clear();
        self.admin_users.clear();
        self.account_uid.clear();
    }
}

/// Handle through which all service-account, admin-roster and drive
/// operations run: the store, this service's own bucket, the service
/// password, and the read caches.
pub struct ServiceContext {
    store: Arc<dyn ObjectStore>,
    bucket: Bucket,
    password: Option<String>,
    caches: Mutex<ServiceCaches>,
}

impl ServiceContext {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: Bucket, config: ServiceConfig) -> ServiceContext {
        ServiceContext {
            store,
            bucket,
            password: config.password,
            caches: Mutex::new(ServiceCaches::new()),
        }
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    /// The service password, or a service-account error when the process
    /// was started without one.
    pub(crate) fn require_password(&self) -> Result<&str> {
        self.password
            .as_deref()
            .ok_or_else(|| FedsvcError::ServiceAccount("you must supply a SERVICE_PASSWORD".to_string()))
    }

    pub(crate) fn caches(&self) -> MutexGuard<'_, ServiceCaches> {
        // a poisoned cache lock only loses cached reads, never state
        self.caches.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Empty every service-info cache atomically. Called by the writers
    /// (rotation, roster append) before they return.
    pub fn clear_serviceinfo_cache(&self) {
        self.caches().clear();
    }
}
