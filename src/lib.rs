//! Directiva Agrícola cache buster
//!
//! Keeps the dashboard's browser state in step with the deployed server:
//! - `watcher`: throttled version polling, hard reload on version change
//! - `clear`: LocalStorage/SessionStorage/IndexedDB clearing with a preserved allowlist
//! - `stamp`: `_t=<millis>` URL cache busting
//! - `platform`: storage, clock, fetch and reload seams (browser + in-memory)
//! - `config`: page-embedded configuration

pub mod clear;
pub mod config;
pub mod error;
pub mod platform;
pub mod stamp;
pub mod watcher;

#[cfg(target_arch = "wasm32")]
pub mod app;

pub use clear::{CacheClearer, ClearReport};
pub use config::WatcherConfig;
pub use error::CacheError;
pub use stamp::add_timestamp;
pub use watcher::{CheckOutcome, VersionWatcher};

/// Storage keys and fixed parameters
pub mod consts {
    /// Minimum time between version polls (5 minutes)
    pub const UPDATE_CHECK_INTERVAL_MS: u64 = 300_000;
    /// Version endpoint path
    pub const DEFAULT_VERSION_URL: &str = "/api/version/";
    /// LocalStorage keys kept across a cache clear
    pub const DEFAULT_PRESERVE_KEYS: &[&str] = &["loginRFC"];

    /// Last version reported by the server
    pub const VERSION_KEY: &str = "appVersion";
    /// Epoch millis of the last poll attempt
    pub const LAST_CHECK_KEY: &str = "lastUpdateCheck";
    /// Set to "true" by a manual forced reload
    pub const FORCE_RELOAD_KEY: &str = "forceReload";

    /// Query parameter appended by the cache buster
    pub const CACHE_BUST_PARAM: &str = "_t";
    /// Hidden input added to submitted forms
    pub const FORM_TIMESTAMP_FIELD: &str = "_timestamp";

    /// Resources re-stamped after a forced reload: (selector, URL attribute)
    pub const RESOURCE_SELECTORS: &[(&str, &str)] = &[
        ("img[src]", "src"),
        ("link[rel=\"stylesheet\"]", "href"),
        ("script[src]", "src"),
    ];
}
