//! Development-time tracing for the checklist agent.
//!
//! Diagnostics only: output goes to stderr and is never part of the saved
//! artifacts or the session snapshot.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`. Compact format on stderr.
///
/// # Example
/// ```bash
/// RUST_LOG=checklist=debug checklist run
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
