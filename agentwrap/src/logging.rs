//! Tracing subscriber setup for embedding binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "agentwrap=debug,tower_http=debug";

/// Installs a global `fmt` subscriber filtered by `RUST_LOG`, or by
/// `default_filter` (falling back to [`DEFAULT_LOG_FILTER`]) when unset.
///
/// Returns `false` when a global subscriber was already installed; calling
/// this more than once is harmless.
pub fn init_tracing(default_filter: Option<&str>) -> bool {
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| default_filter.unwrap_or(DEFAULT_LOG_FILTER).to_string());

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
