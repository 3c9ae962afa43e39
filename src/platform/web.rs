//! Browser implementations of the platform traits

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Response, Storage};

use super::{DatabaseWiper, KeyValueStore, Reloader, VersionEndpoint, VersionInfo};
use crate::error::CacheError;

// indexedDB.databases() is not exposed by web-sys
#[wasm_bindgen(inline_js = "
    export function delete_all_databases() {
        if (!('indexedDB' in window) || typeof indexedDB.databases !== 'function') {
            return false;
        }
        indexedDB.databases()
            .then(dbs => dbs.forEach(db => indexedDB.deleteDatabase(db.name)))
            .catch(() => {});
        return true;
    }
")]
extern "C" {
    #[wasm_bindgen(catch)]
    fn delete_all_databases() -> Result<bool, JsValue>;
}

/// `window.localStorage` or `window.sessionStorage`
///
/// Holds `None` when the browser denies access (private mode, sandboxed
/// iframe); every call then fails with `CacheError::Storage`.
#[derive(Debug, Clone)]
pub struct WebStorage(Option<Storage>);

impl WebStorage {
    pub fn local() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();
        if storage.is_none() {
            log::warn!("LocalStorage unavailable");
        }
        Self(storage)
    }

    pub fn session() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.session_storage().ok())
            .flatten();
        if storage.is_none() {
            log::warn!("SessionStorage unavailable");
        }
        Self(storage)
    }

    fn storage(&self) -> Result<&Storage, CacheError> {
        self.0
            .as_ref()
            .ok_or_else(|| CacheError::Storage("storage unavailable".to_string()))
    }
}

impl KeyValueStore for WebStorage {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.storage()?.get_item(key).map_err(CacheError::storage)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.storage()?.set_item(key, value).map_err(CacheError::storage)
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.storage()?.remove_item(key).map_err(CacheError::storage)
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.storage()?.clear().map_err(CacheError::storage)
    }
}

/// Version endpoint reached through `window.fetch`
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchEndpoint;

impl VersionEndpoint for FetchEndpoint {
    async fn fetch_version(&self, url: &str) -> Result<VersionInfo, CacheError> {
        let window =
            web_sys::window().ok_or_else(|| CacheError::Network("no window".to_string()))?;

        let resp = JsFuture::from(window.fetch_with_str(url))
            .await
            .map_err(CacheError::network)?;
        let resp: Response = resp.dyn_into().map_err(CacheError::network)?;

        if !resp.ok() {
            return Err(CacheError::Http(resp.status()));
        }

        let body = JsFuture::from(resp.text().map_err(CacheError::network)?)
            .await
            .map_err(CacheError::network)?;
        let body = body
            .as_string()
            .ok_or_else(|| CacheError::Parse("response body is not text".to_string()))?;

        Ok(serde_json::from_str(&body)?)
    }
}

/// Hard reload through `location.reload(true)`
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationReloader;

impl Reloader for LocationReloader {
    fn hard_reload(&self) {
        if let Some(window) = web_sys::window() {
            if let Err(e) = window.location().reload_with_forceget(true) {
                log::warn!("Reload failed: {:?}", e);
            }
        }
    }
}

/// Deletes every IndexedDB database of this origin
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexedDbWiper;

impl DatabaseWiper for IndexedDbWiper {
    fn delete_all(&self) -> Result<(), CacheError> {
        match delete_all_databases() {
            Ok(true) => Ok(()),
            Ok(false) => {
                log::debug!("indexedDB.databases() not supported, nothing to delete");
                Ok(())
            }
            Err(e) => Err(CacheError::storage(e)),
        }
    }
}
