//! Cache buster entry point
//!
//! The browser build starts from `app::start`. Natively this binary stamps
//! each URL given on the command line with the current time.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use agro_cache_buster::add_timestamp;
    use agro_cache_buster::platform::{Clock, SystemClock};

    env_logger::init();

    let urls: Vec<String> = std::env::args().skip(1).collect();
    if urls.is_empty() {
        eprintln!("Usage: cache-buster <url>...");
        log::info!("The dashboard integration runs in the browser, build with `trunk build`");
        return;
    }

    let now = SystemClock.now_ms();
    log::debug!("Stamping {} URLs at {}", urls.len(), now);
    for url in &urls {
        println!("{}", add_timestamp(url, now));
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is app::start, this is just to satisfy the compiler
}
