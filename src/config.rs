//! Watcher configuration
//!
//! Read from an optional JSON block embedded in the page. Missing fields fall
//! back to defaults so a template only needs to override what differs.

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_PRESERVE_KEYS, DEFAULT_VERSION_URL, UPDATE_CHECK_INTERVAL_MS};

/// Cache buster settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Minimum time between version polls (ms)
    pub interval_ms: u64,
    /// Version endpoint, before the cache-bust parameter is appended
    pub version_url: String,
    /// LocalStorage keys that survive a cache clear
    pub preserve_keys: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            interval_ms: UPDATE_CHECK_INTERVAL_MS,
            version_url: DEFAULT_VERSION_URL.to_string(),
            preserve_keys: DEFAULT_PRESERVE_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl WatcherConfig {
    /// DOM id of the embedded config block
    #[allow(dead_code)]
    const ELEMENT_ID: &'static str = "cache-buster-config";

    /// Parse from JSON, keeping defaults for absent fields
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load from `<script id="cache-buster-config" type="application/json">` (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let text = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(Self::ELEMENT_ID))
            .and_then(|el| el.text_content());

        if let Some(json) = text {
            match Self::from_json(&json) {
                Ok(config) => {
                    log::info!("Loaded cache buster config from page");
                    return config;
                }
                Err(e) => log::warn!("Invalid cache buster config, using defaults: {}", e),
            }
        }

        Self::default()
    }

    /// Native stub
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }
}
