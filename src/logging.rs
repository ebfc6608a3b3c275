//! Logging configuration for the orchestrator.
//!
//! This is a server process, not a terminal application, so logs always go
//! to stderr — there is no terminal display to protect from corruption.

use tracing_subscriber::EnvFilter;

/// Initializes stderr logging with an `RUST_LOG`-driven env filter,
/// defaulting to `info`.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
