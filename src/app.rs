//! Browser entry point and DOM wiring
//!
//! Registers the page listeners and exposes `window.CacheBuster` for
//! templates that need to clear or reload by hand.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Object, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    AddEventListenerOptions, Document, Element, Event, HtmlFormElement, HtmlInputElement,
};

use crate::clear::{CacheClearer, ClearReport};
use crate::config::WatcherConfig;
use crate::consts::{FORM_TIMESTAMP_FIELD, RESOURCE_SELECTORS};
use crate::platform::web::{FetchEndpoint, IndexedDbWiper, LocationReloader, WebStorage};
use crate::platform::{Clock, SystemClock};
use crate::stamp::add_timestamp;
use crate::watcher::VersionWatcher;

type PageWatcher = VersionWatcher<WebStorage, SystemClock, FetchEndpoint, LocationReloader>;
type PageClearer = CacheClearer<WebStorage, WebStorage, IndexedDbWiper>;

/// Watcher and clearer bound to this page's storage
struct CacheBuster {
    watcher: PageWatcher,
    clearer: PageClearer,
}

impl CacheBuster {
    fn from_page() -> Self {
        let config = WatcherConfig::load();
        let local = WebStorage::local();
        Self {
            clearer: CacheClearer::new(
                local.clone(),
                WebStorage::session(),
                IndexedDbWiper,
                config.preserve_keys.clone(),
            ),
            watcher: VersionWatcher::new(
                local,
                SystemClock,
                FetchEndpoint,
                LocationReloader,
                config,
            ),
        }
    }
}

thread_local! {
    static APP: RefCell<Option<Rc<CacheBuster>>> = const { RefCell::new(None) };
}

/// Current instance, built on first use
fn app() -> Rc<CacheBuster> {
    APP.with(|slot| {
        slot.borrow_mut()
            .get_or_insert_with(|| Rc::new(CacheBuster::from_page()))
            .clone()
    })
}

/// Rebuild from the page once the DOM (and its config block) is parsed
fn reload_app() -> Rc<CacheBuster> {
    let app = Rc::new(CacheBuster::from_page());
    APP.with(|slot| *slot.borrow_mut() = Some(app.clone()));
    app
}

/// Run a version check without blocking the caller
fn spawn_update_check() {
    let app = app();
    wasm_bindgen_futures::spawn_local(async move {
        let outcome = app.watcher.check_for_updates().await;
        log::debug!("Version check: {:?}", outcome);
    });
}

/// Set the hidden `_timestamp` input of a form about to be submitted
///
/// Reuses the input added by an earlier blocked submit.
fn stamp_form(document: &Document, form: &HtmlFormElement) {
    let now = SystemClock.now_ms().to_string();
    let selector = format!("input[name=\"{}\"]", FORM_TIMESTAMP_FIELD);

    let existing = form
        .query_selector(&selector)
        .ok()
        .flatten()
        .and_then(|el| el.dyn_into::<HtmlInputElement>().ok());
    if let Some(input) = existing {
        input.set_value(&now);
        return;
    }

    let input = match document
        .create_element("input")
        .ok()
        .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
    {
        Some(input) => input,
        None => return,
    };
    input.set_type("hidden");
    input.set_name(FORM_TIMESTAMP_FIELD);
    input.set_value(&now);
    if let Err(e) = form.append_child(&input) {
        log::warn!("Could not stamp form: {:?}", e);
    }
}

/// Re-stamp stylesheet, script, and image URLs so the browser refetches them
fn restamp_resources() {
    let document = match web_sys::window().and_then(|w| w.document()) {
        Some(d) => d,
        None => return,
    };
    let now = SystemClock.now_ms();
    let mut count = 0;

    for (selector, attr) in RESOURCE_SELECTORS {
        let nodes = match document.query_selector_all(selector) {
            Ok(nodes) => nodes,
            Err(_) => continue,
        };
        for i in 0..nodes.length() {
            let Some(el) = nodes.item(i).and_then(|n| n.dyn_into::<Element>().ok()) else {
                continue;
            };
            if let Some(url) = el.get_attribute(attr).filter(|u| !u.is_empty()) {
                let _ = el.set_attribute(attr, &add_timestamp(&url, now));
                count += 1;
            }
        }
    }

    log::info!("Re-stamped {} page resources", count);
}

/// Work done once the DOM is ready
fn init() {
    let app = reload_app();
    if app.watcher.take_force_reload_flag() {
        restamp_resources();
    }
    spawn_update_check();
    log::info!("Cache buster initialized");
}

fn install_listeners(document: &Document) {
    let Some(window) = web_sys::window() else {
        return;
    };

    // Form submit, capture phase so it runs before any page handler
    {
        let doc = document.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |event: Event| {
            if let Some(form) = event
                .target()
                .and_then(|t| t.dyn_into::<HtmlFormElement>().ok())
            {
                stamp_form(&doc, &form);
            }
            app().clearer.clear_browser_cache();
        });
        let options = AddEventListenerOptions::new();
        options.set_capture(true);
        let _ = document.add_event_listener_with_callback_and_add_event_listener_options(
            "submit",
            closure.as_ref().unchecked_ref(),
            &options,
        );
        closure.forget();
    }

    // Leaving the page
    {
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: Event| {
            app().clearer.clear_browser_cache();
        });
        let _ = window
            .add_event_listener_with_callback("beforeunload", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    // Back online
    {
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: Event| {
            log::info!("Connection restored, checking for updates");
            spawn_update_check();
        });
        let _ =
            window.add_event_listener_with_callback("online", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    // Document ready
    if document.ready_state() == "loading" {
        let closure = Closure::once(move |_event: Event| init());
        let _ = document
            .add_event_listener_with_callback("DOMContentLoaded", closure.as_ref().unchecked_ref());
        closure.forget();
    } else {
        init();
    }
}

/// Publish `window.CacheBuster` for inline scripts
fn expose_global() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let api = Object::new();

    let clear = Closure::<dyn Fn()>::new(|| {
        clear_cache();
    });
    Reflect::set(&api, &"clearCache".into(), &clear.into_js_value())?;

    let update = Closure::<dyn Fn()>::new(update_resources);
    Reflect::set(&api, &"updateResources".into(), &update.into_js_value())?;

    let stamp = Closure::<dyn Fn(String) -> String>::new(|url: String| add_timestamp_now(&url));
    Reflect::set(&api, &"addTimestamp".into(), &stamp.into_js_value())?;

    let reload = Closure::<dyn Fn()>::new(force_reload);
    Reflect::set(&api, &"forceReload".into(), &reload.into_js_value())?;

    Reflect::set(&window, &"CacheBuster".into(), &api)?;
    Ok(())
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&"Cache buster logger already set".into());
    }

    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };

    install_listeners(&document);
    if let Err(e) = expose_global() {
        log::warn!("Could not publish window.CacheBuster: {:?}", e);
    }
}

/// Clear browser storage now, keeping preserved keys
#[wasm_bindgen(js_name = clearCache)]
pub fn clear_cache() -> bool {
    let report: ClearReport = app().clearer.clear_browser_cache();
    report.is_complete()
}

/// Re-stamp page resource URLs
#[wasm_bindgen(js_name = updateResources)]
pub fn update_resources() {
    restamp_resources();
}

/// Append `_t=<now>` to `url`
#[wasm_bindgen(js_name = addTimestamp)]
pub fn add_timestamp_now(url: &str) -> String {
    add_timestamp(url, SystemClock.now_ms())
}

/// Flag a forced reload and hard-reload the page
#[wasm_bindgen(js_name = forceReload)]
pub fn force_reload() {
    app().watcher.force_reload();
}
