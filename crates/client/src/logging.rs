// crates/client/src/logging.rs
//! Tracing init for binaries embedding the client.
//!
//! Libraries should not install a subscriber behind their host's back, so
//! this is opt-in and tolerates being called twice.

use tracing_subscriber::EnvFilter;

/// Install an stderr fmt subscriber honoring `RUST_LOG`.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,axiomflow_client=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
