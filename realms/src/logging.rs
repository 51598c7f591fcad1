//! Development-time tracing for the realms runtime and CLI.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! binary's job. Output goes to stderr so the CLI's JSON on stdout stays
//! machine-readable.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Falls back to `default_filter` (the configured
/// `log_filter`) if unset or invalid. Call once per process: a second call
/// panics.
///
/// # Example
/// ```bash
/// RUST_LOG=realms=debug cargo run -- demo --steps 3
/// ```
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
