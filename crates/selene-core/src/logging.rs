//! Log output setup
//!
//! The runtime only emits `tracing` events; nothing is printed until a
//! subscriber is installed. These helpers install a compact one with thread
//! names, since most interesting events come from spawned threads.
//!
//! ```rust
//! selene_core::logging::init();
//! tracing::info!("runtime ready");
//! ```

use crate::config::LoggingOptions;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

/// Install the subscriber at INFO level
///
/// Returns `false` if a global subscriber was already installed.
pub fn init() -> bool {
    init_with_level(Level::INFO)
}

/// Install the subscriber at `level`
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_with_level(level: Level) -> bool {
    let layer = tracing_subscriber::fmt::layer()
        .without_time()
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .with_filter(LevelFilter::from_level(level));

    Registry::default().with(layer).try_init().is_ok()
}

/// Install the subscriber described by `options`
///
/// An unknown level falls back to INFO.
pub fn init_from(options: &LoggingOptions) -> bool {
    init_with_level(options.max_level().unwrap_or(Level::INFO))
}

/// Install a subscriber writing through the test harness's capture
pub fn init_for_tests() -> bool {
    tracing_subscriber::fmt()
        .with_max_level(Level::TRACE)
        .with_test_writer()
        .with_thread_names(true)
        .try_init()
        .is_ok()
}
