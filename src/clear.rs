//! Browser cache clearing
//!
//! Wipes LocalStorage except an allowlist, wipes SessionStorage, and deletes
//! every IndexedDB database. Each step is best-effort and independent.

use crate::consts::FORCE_RELOAD_KEY;
use crate::platform::{DatabaseWiper, KeyValueStore};

/// Which clearing steps completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClearReport {
    pub local_cleared: bool,
    pub session_cleared: bool,
    pub databases_cleared: bool,
}

impl ClearReport {
    pub fn is_complete(&self) -> bool {
        self.local_cleared && self.session_cleared && self.databases_cleared
    }
}

/// Clears persisted client state while keeping the preserved keys
pub struct CacheClearer<L, S, D> {
    local: L,
    session: S,
    databases: D,
    preserve_keys: Vec<String>,
}

impl<L, S, D> CacheClearer<L, S, D>
where
    L: KeyValueStore,
    S: KeyValueStore,
    D: DatabaseWiper,
{
    pub fn new(local: L, session: S, databases: D, preserve_keys: Vec<String>) -> Self {
        Self {
            local,
            session,
            databases,
            preserve_keys,
        }
    }

    pub fn preserve_keys(&self) -> &[String] {
        &self.preserve_keys
    }

    /// Clear every store, keeping the preserved LocalStorage keys
    ///
    /// A pending `forceReload` flag is always kept as well.
    pub fn clear_browser_cache(&self) -> ClearReport {
        let report = ClearReport {
            local_cleared: self.clear_local(),
            session_cleared: match self.session.clear() {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("SessionStorage clear failed: {}", e);
                    false
                }
            },
            databases_cleared: match self.databases.delete_all() {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("IndexedDB cleanup failed: {}", e);
                    false
                }
            },
        };

        if report.is_complete() {
            log::debug!("Browser cache cleared");
        }
        report
    }

    fn clear_local(&self) -> bool {
        // A pending forced reload must reach the next page even though the
        // reload itself fires beforeunload
        let keep = self
            .preserve_keys
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(FORCE_RELOAD_KEY));

        let mut preserved: Vec<(&str, String)> = Vec::with_capacity(self.preserve_keys.len() + 1);
        for key in keep {
            if preserved.iter().any(|(k, _)| *k == key) {
                continue;
            }
            match self.local.get(key) {
                Ok(Some(value)) => preserved.push((key, value)),
                Ok(None) => {}
                Err(e) => {
                    // Clearing now would lose a value we could not read
                    log::warn!("LocalStorage read of '{}' failed, skipping clear: {}", key, e);
                    return false;
                }
            }
        }

        if let Err(e) = self.local.clear() {
            log::warn!("LocalStorage clear failed: {}", e);
            return false;
        }

        let mut ok = true;
        for (key, value) in &preserved {
            if let Err(e) = self.local.set(key, value) {
                log::warn!("Failed to restore preserved key '{}': {}", key, e);
                ok = false;
            }
        }
        ok
    }
}
