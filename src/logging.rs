//! Console diagnostics.
//!
//! Everything the stage reports goes through `tracing`. The level defaults
//! to `info` and can be overridden with `RUST_LOG` (e.g. `RUST_LOG=debug`).
use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
