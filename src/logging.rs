// ==========================================
// Logging setup
// ==========================================
// tracing + tracing-subscriber; import runs log one span-less line
// per phase, so line numbers and targets stay on.
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// Default directive: crate at info, dependencies at warn.
const DEFAULT_FILTER: &str = "warn,nexo_planning=info";

/// Initializes the logging system.
///
/// # Environment
/// - RUST_LOG overrides the default filter,
///   e.g. RUST_LOG=debug or RUST_LOG=nexo_planning=trace
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();
}

/// Test-environment logging, more verbose and test-writer bound.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("warn,nexo_planning=debug"))
        .with_test_writer()
        .try_init();
}
