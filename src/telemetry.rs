//! Tracing subscriber setup for binaries and tests.
//!
//! The relay emits `tracing` events at every hand-off (posts, takes, slot
//! lifecycle) and spans around the handle entry points. Library users who
//! already run a subscriber need nothing from here; [`init`] is the
//! one-call setup for executables and test harnesses.

use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber filtered by `RUST_LOG`.
///
/// Defaults to `info` when `RUST_LOG` is unset. Loads a `.env` file first
/// so local runs can keep their filter there. Safe to call more than once;
/// later calls are no-ops.
pub fn init() {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
