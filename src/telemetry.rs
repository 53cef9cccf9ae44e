//! Tracing setup.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber, honoring `RUST_LOG` and defaulting to
/// `info` for this crate. Safe to call more than once; later calls are
/// no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("notafacil=info,warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
