//! Tracing setup for the binary and for tests that want log output.

use tracing_subscriber::EnvFilter;

/// Install a compact `fmt` subscriber. `RUST_LOG` overrides `default_level`.
///
/// Calling this more than once is harmless: later calls leave the first subscriber in place.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
    if installed.is_ok() {
        tracing::debug!(level = default_level, "Tracing initialised");
    }
}
