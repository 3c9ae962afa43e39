//! Platform abstraction layer
//!
//! The watcher and clearer only talk to the browser through these traits:
//! - Key/value storage (LocalStorage, SessionStorage)
//! - Wall clock
//! - Version endpoint (fetch)
//! - Hard reload
//! - IndexedDB deletion

pub mod memory;
#[cfg(target_arch = "wasm32")]
pub mod web;

use serde::Deserialize;

use crate::error::CacheError;

/// Body of a successful version endpoint response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VersionInfo {
    pub version: String,
}

/// Synchronous string-keyed store
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
    fn remove(&self, key: &str) -> Result<(), CacheError>;
    /// Remove every key
    fn clear(&self) -> Result<(), CacheError>;
}

/// Epoch milliseconds
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Remote source of the deployed application version
#[allow(async_fn_in_trait)]
pub trait VersionEndpoint {
    /// GET `url` and parse `{ "version": ... }`
    async fn fetch_version(&self, url: &str) -> Result<VersionInfo, CacheError>;
}

/// Reload of the current document bypassing caches
pub trait Reloader {
    fn hard_reload(&self);
}

/// Deletes structured client-side databases (IndexedDB)
pub trait DatabaseWiper {
    /// Start deleting every database. Completion is not awaited.
    fn delete_all(&self) -> Result<(), CacheError>;
}

/// Wall clock backed by the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[cfg(target_arch = "wasm32")]
    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}
