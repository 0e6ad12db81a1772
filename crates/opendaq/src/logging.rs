//! Tracing setup shared by integration tests and example binaries.
//!
//! The library itself never initializes a global subscriber — only a
//! binary's `main()` should — so this helper exists for callers that
//! want the same `tracing_subscriber::fmt` + `EnvFilter` pair without
//! hand-rolling it.

use tracing_subscriber::EnvFilter;

/// Initialize a `tracing_subscriber::fmt` subscriber honoring `RUST_LOG`,
/// defaulting to `info` when unset. Safe to call more than once; later
/// calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
