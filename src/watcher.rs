//! Deployed-version watcher
//!
//! Polls the version endpoint at most once per interval and hard-reloads the
//! page when the server reports a version different from the one persisted
//! on a previous poll.
//!
//! Per-poll flow: idle → (interval elapsed?) → polling → success (maybe
//! reload) | failure → idle. A reload ends the page's execution context.

use crate::config::WatcherConfig;
use crate::consts::{FORCE_RELOAD_KEY, LAST_CHECK_KEY, VERSION_KEY};
use crate::platform::{Clock, KeyValueStore, Reloader, VersionEndpoint};
use crate::stamp::add_timestamp;

/// Result of one `check_for_updates` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Interval has not elapsed, nothing was requested
    Skipped,
    /// No version was stored yet, this one is now recorded
    FirstVersion(String),
    /// Server version matches the stored one
    Unchanged,
    /// Server version changed and a hard reload was requested
    Reloaded { previous: String, current: String },
    /// Request or parse failed, only the check timestamp advanced
    Failed,
}

/// Keeps the stored app version in sync with the server
pub struct VersionWatcher<S, C, E, R> {
    store: S,
    clock: C,
    endpoint: E,
    reloader: R,
    config: WatcherConfig,
}

impl<S, C, E, R> VersionWatcher<S, C, E, R>
where
    S: KeyValueStore,
    C: Clock,
    E: VersionEndpoint,
    R: Reloader,
{
    pub fn new(store: S, clock: C, endpoint: E, reloader: R, config: WatcherConfig) -> Self {
        Self {
            store,
            clock,
            endpoint,
            reloader,
            config,
        }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Whether enough time has passed since the last poll attempt
    ///
    /// A missing or unparsable timestamp counts as infinitely old. A
    /// timestamp in the future (clock moved back) does not.
    pub fn is_due(&self, now: u64) -> bool {
        let last = match self.store.get(LAST_CHECK_KEY) {
            Ok(Some(raw)) => raw.trim().parse::<u64>().ok(),
            Ok(None) => None,
            Err(e) => {
                log::warn!("Could not read {}: {}", LAST_CHECK_KEY, e);
                None
            }
        };
        match last {
            None => true,
            Some(last) => now.saturating_sub(last) > self.config.interval_ms,
        }
    }

    /// Poll the version endpoint if the interval has elapsed
    ///
    /// Errors never escape: failures only advance the check timestamp.
    pub async fn check_for_updates(&self) -> CheckOutcome {
        let now = self.clock.now_ms();
        if !self.is_due(now) {
            log::debug!("Version check skipped, last check too recent");
            return CheckOutcome::Skipped;
        }

        let url = add_timestamp(&self.config.version_url, now);
        let info = match self.endpoint.fetch_version(&url).await {
            Ok(info) => info,
            Err(e) => {
                log::warn!("Version check failed: {}", e);
                self.persist(LAST_CHECK_KEY, &now.to_string());
                return CheckOutcome::Failed;
            }
        };

        let previous = self.store.get(VERSION_KEY).unwrap_or_else(|e| {
            log::warn!("Could not read {}: {}", VERSION_KEY, e);
            None
        });

        // Persist before reloading so the next page load sees the new version
        self.persist(VERSION_KEY, &info.version);
        self.persist(LAST_CHECK_KEY, &now.to_string());

        match previous {
            Some(previous) if previous != info.version => {
                log::info!(
                    "New version available ({} -> {}), reloading",
                    previous,
                    info.version
                );
                self.reloader.hard_reload();
                CheckOutcome::Reloaded {
                    previous,
                    current: info.version,
                }
            }
            Some(_) => CheckOutcome::Unchanged,
            None => {
                log::info!("Recorded app version {}", info.version);
                CheckOutcome::FirstVersion(info.version)
            }
        }
    }

    /// Set the force-reload flag and hard-reload the page
    pub fn force_reload(&self) {
        self.persist(FORCE_RELOAD_KEY, "true");
        log::info!("Forced reload requested");
        self.reloader.hard_reload();
    }

    /// Consume a pending force-reload flag
    ///
    /// Returns true if the previous page requested a forced reload, in which
    /// case the caller should re-stamp page resources.
    pub fn take_force_reload_flag(&self) -> bool {
        match self.store.get(FORCE_RELOAD_KEY) {
            Ok(Some(flag)) if flag == "true" => {
                if let Err(e) = self.store.remove(FORCE_RELOAD_KEY) {
                    log::warn!("Could not clear {}: {}", FORCE_RELOAD_KEY, e);
                }
                true
            }
            Ok(_) => false,
            Err(e) => {
                log::warn!("Could not read {}: {}", FORCE_RELOAD_KEY, e);
                false
            }
        }
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            log::warn!("Could not persist {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clear::CacheClearer;
    use crate::error::CacheError;
    use crate::platform::{DatabaseWiper, VersionInfo};
    use crate::platform::memory::{ManualClock, MemoryStore};
    use futures::executor::block_on;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Endpoint replaying canned responses and recording requested URLs
    #[derive(Clone, Default)]
    struct StubEndpoint {
        responses: Rc<RefCell<VecDeque<Result<VersionInfo, CacheError>>>>,
        urls: Rc<RefCell<Vec<String>>>,
    }

    impl StubEndpoint {
        fn push_version(&self, v: &str) {
            self.responses.borrow_mut().push_back(Ok(VersionInfo {
                version: v.to_string(),
            }));
        }

        fn push_error(&self, e: CacheError) {
            self.responses.borrow_mut().push_back(Err(e));
        }

        fn calls(&self) -> usize {
            self.urls.borrow().len()
        }
    }

    impl VersionEndpoint for StubEndpoint {
        async fn fetch_version(&self, url: &str) -> Result<VersionInfo, CacheError> {
            self.urls.borrow_mut().push(url.to_string());
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(CacheError::Network("no response queued".to_string())))
        }
    }

    /// Reloader capturing the store contents at the moment of reload
    #[derive(Clone)]
    struct RecordingReloader {
        store: MemoryStore,
        seen: Rc<RefCell<Vec<(Option<String>, Option<String>)>>>,
    }

    impl RecordingReloader {
        fn new(store: &MemoryStore) -> Self {
            Self {
                store: store.clone(),
                seen: Rc::default(),
            }
        }

        fn count(&self) -> usize {
            self.seen.borrow().len()
        }
    }

    impl Reloader for RecordingReloader {
        fn hard_reload(&self) {
            let version = self.store.get(VERSION_KEY).unwrap();
            let force = self.store.get(FORCE_RELOAD_KEY).unwrap();
            self.seen.borrow_mut().push((version, force));
        }
    }

    struct NoDatabases;

    impl DatabaseWiper for NoDatabases {
        fn delete_all(&self) -> Result<(), CacheError> {
            Ok(())
        }
    }

    type TestWatcher = VersionWatcher<MemoryStore, ManualClock, StubEndpoint, RecordingReloader>;

    struct Harness {
        store: MemoryStore,
        clock: ManualClock,
        endpoint: StubEndpoint,
        reloader: RecordingReloader,
        watcher: TestWatcher,
    }

    fn harness(store: MemoryStore) -> Harness {
        let clock = ManualClock::new(1_700_000_000_000);
        let endpoint = StubEndpoint::default();
        let reloader = RecordingReloader::new(&store);
        let watcher = VersionWatcher::new(
            store.clone(),
            clock.clone(),
            endpoint.clone(),
            reloader.clone(),
            WatcherConfig::default(),
        );
        Harness {
            store,
            clock,
            endpoint,
            reloader,
            watcher,
        }
    }

    #[test]
    fn test_first_poll_records_version() {
        let h = harness(MemoryStore::new());
        h.endpoint.push_version("1.4.0");

        let outcome = block_on(h.watcher.check_for_updates());

        assert_eq!(outcome, CheckOutcome::FirstVersion("1.4.0".to_string()));
        assert_eq!(h.store.get(VERSION_KEY).unwrap().as_deref(), Some("1.4.0"));
        assert_eq!(
            h.store.get(LAST_CHECK_KEY).unwrap(),
            Some(h.clock.now_ms().to_string())
        );
        assert_eq!(h.reloader.count(), 0);
        assert_eq!(
            h.endpoint.urls.borrow()[0],
            format!("/api/version/?_t={}", h.clock.now_ms())
        );
    }

    #[test]
    fn test_second_call_within_interval_is_noop() {
        let h = harness(MemoryStore::new());
        h.endpoint.push_version("1.0");
        h.endpoint.push_version("2.0");

        block_on(h.watcher.check_for_updates());
        h.clock.advance(300_000);
        let outcome = block_on(h.watcher.check_for_updates());

        assert_eq!(outcome, CheckOutcome::Skipped);
        assert_eq!(h.endpoint.calls(), 1);
    }

    #[test]
    fn test_poll_after_interval() {
        let h = harness(MemoryStore::new());
        h.endpoint.push_version("1.0");
        h.endpoint.push_version("1.0");

        block_on(h.watcher.check_for_updates());
        h.clock.advance(300_001);
        let outcome = block_on(h.watcher.check_for_updates());

        assert_eq!(outcome, CheckOutcome::Unchanged);
        assert_eq!(h.endpoint.calls(), 2);
        assert_eq!(h.reloader.count(), 0);
    }

    #[test]
    fn test_version_change_reloads_once_after_persisting() {
        let h = harness(MemoryStore::with_entries([("appVersion", "1.0")]));
        h.endpoint.push_version("1.1");

        let outcome = block_on(h.watcher.check_for_updates());

        assert_eq!(
            outcome,
            CheckOutcome::Reloaded {
                previous: "1.0".to_string(),
                current: "1.1".to_string(),
            }
        );
        assert_eq!(h.reloader.count(), 1);
        // New version was already stored when reload fired
        assert_eq!(h.reloader.seen.borrow()[0].0.as_deref(), Some("1.1"));
    }

    #[test]
    fn test_failure_advances_timestamp_only() {
        let h = harness(MemoryStore::with_entries([("appVersion", "1.0")]));
        h.endpoint.push_error(CacheError::Http(500));

        let outcome = block_on(h.watcher.check_for_updates());

        assert_eq!(outcome, CheckOutcome::Failed);
        assert_eq!(h.store.get(VERSION_KEY).unwrap().as_deref(), Some("1.0"));
        assert_eq!(
            h.store.get(LAST_CHECK_KEY).unwrap(),
            Some(h.clock.now_ms().to_string())
        );
        assert_eq!(h.reloader.count(), 0);

        // Failure still throttles the next attempt
        h.clock.advance(1_000);
        assert_eq!(block_on(h.watcher.check_for_updates()), CheckOutcome::Skipped);
        assert_eq!(h.endpoint.calls(), 1);
    }

    #[test]
    fn test_parse_failure_treated_as_failure() {
        let h = harness(MemoryStore::new());
        h.endpoint
            .push_error(CacheError::Parse("expected value".to_string()));

        assert_eq!(block_on(h.watcher.check_for_updates()), CheckOutcome::Failed);
        assert_eq!(h.store.get(VERSION_KEY).unwrap(), None);
    }

    #[test]
    fn test_garbage_timestamp_counts_as_missing() {
        let h = harness(MemoryStore::with_entries([("lastUpdateCheck", "NaN")]));
        h.endpoint.push_version("1.0");

        assert_eq!(
            block_on(h.watcher.check_for_updates()),
            CheckOutcome::FirstVersion("1.0".to_string())
        );
    }

    #[test]
    fn test_future_timestamp_not_due() {
        let h = harness(MemoryStore::new());
        let future = (h.clock.now_ms() + 60_000).to_string();
        h.store.set(LAST_CHECK_KEY, &future).unwrap();

        assert!(!h.watcher.is_due(h.clock.now_ms()));
    }

    #[test]
    fn test_timestamp_non_decreasing() {
        let h = harness(MemoryStore::new());
        let mut last = 0u64;
        for i in 0..6 {
            if i % 2 == 0 {
                h.endpoint.push_version("1.0");
            } else {
                h.endpoint.push_error(CacheError::Network("offline".to_string()));
            }
            block_on(h.watcher.check_for_updates());
            let stamp: u64 = h.store.get(LAST_CHECK_KEY).unwrap().unwrap().parse().unwrap();
            assert!(stamp >= last);
            last = stamp;
            h.clock.advance(120_000);
        }
    }

    #[test]
    fn test_storage_failure_is_swallowed() {
        let h = harness(MemoryStore::new());
        h.store.set_failing(true);
        h.endpoint.push_version("1.0");

        assert_eq!(
            block_on(h.watcher.check_for_updates()),
            CheckOutcome::FirstVersion("1.0".to_string())
        );
    }

    #[test]
    fn test_force_reload_sets_flag_first() {
        let h = harness(MemoryStore::new());

        h.watcher.force_reload();

        assert_eq!(h.reloader.count(), 1);
        assert_eq!(h.reloader.seen.borrow()[0].1.as_deref(), Some("true"));
    }

    #[test]
    fn test_take_force_reload_flag() {
        let h = harness(MemoryStore::with_entries([("forceReload", "true")]));

        assert!(h.watcher.take_force_reload_flag());
        assert_eq!(h.store.get(FORCE_RELOAD_KEY).unwrap(), None);
        assert!(!h.watcher.take_force_reload_flag());
    }

    #[test]
    fn test_force_reload_flag_other_value_ignored() {
        let h = harness(MemoryStore::with_entries([("forceReload", "yes")]));

        assert!(!h.watcher.take_force_reload_flag());
        assert_eq!(h.store.get(FORCE_RELOAD_KEY).unwrap().as_deref(), Some("yes"));
    }

    #[test]
    fn test_force_reload_flag_survives_unload_clear() {
        let h = harness(MemoryStore::with_entries([("loginRFC", "r"), ("appVersion", "1.0")]));
        let clearer = CacheClearer::new(
            h.store.clone(),
            MemoryStore::new(),
            NoDatabases,
            h.watcher.config().preserve_keys.clone(),
        );

        h.watcher.force_reload();
        // The reload fires beforeunload, which clears the cache
        clearer.clear_browser_cache();

        assert_eq!(h.store.get(VERSION_KEY).unwrap(), None);
        assert!(h.watcher.take_force_reload_flag());
        assert_eq!(h.store.get(FORCE_RELOAD_KEY).unwrap(), None);
        assert_eq!(h.store.get("loginRFC").unwrap().as_deref(), Some("r"));
    }
}
