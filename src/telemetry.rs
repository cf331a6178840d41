//! Tracing setup for binaries and tests.
//!
//! The crate itself only emits through the `tracing` macros; installing a
//! subscriber is the embedding application's call. This helper covers the
//! common case.

use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber honoring `RUST_LOG`, defaulting to
/// `info`. Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
