//! URL cache busting
//!
//! Appends a `_t=<millis>` query parameter so browsers and proxies treat the
//! URL as new.

use crate::consts::CACHE_BUST_PARAM;

/// Append `_t=<now_ms>` to `url`
///
/// Uses `?` when the URL has no query string and `&` otherwise. A `#fragment`
/// stays at the end and is not inspected for `?`.
pub fn add_timestamp(url: &str, now_ms: u64) -> String {
    let (base, fragment) = match url.find('#') {
        Some(i) => url.split_at(i),
        None => (url, ""),
    };
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{CACHE_BUST_PARAM}={now_ms}{fragment}")
}
