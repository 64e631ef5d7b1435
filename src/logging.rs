//! Operator-facing tracing output.
//!
//! The sync runs one-shot from a timer; everything it logs goes to stderr
//! and is picked up by the service manager's journal.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `info` so convergence actions (restored,
/// pruned, registered, stale) are visible in the journal.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
