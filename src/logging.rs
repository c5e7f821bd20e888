//! Logging Initialization
//!
//! Sets up a tracing subscriber for binaries embedding the engine.
//! Library code only emits `tracing` events; hosts decide where they go.

use tracing_subscriber::prelude::*;

/// Initializes a stdout tracing subscriber with env-filter support.
///
/// Honors `RUST_LOG`; defaults to INFO. Safe to call more than once
/// (subsequent calls are no-ops).
pub fn init() {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(cfg!(debug_assertions));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    // Avoid panics if already initialized (tests, embedding hosts).
    let _ = tracing::subscriber::set_global_default(subscriber);
}
