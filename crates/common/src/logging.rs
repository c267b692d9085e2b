//! Logging setup shared by the healthcheck binaries and tests.
//!
//! Logs go to stderr; stdout is left to the event stream.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Build the level filter.
///
/// `RUST_LOG` wins over the configured level when it is set.
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize tracing with human-readable output at `level`.
pub fn init(level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter(level))
        .init();
}

/// Initialize tracing with JSON formatting (useful for structured logging).
pub fn init_json(level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .with(filter(level))
        .init();
}

/// Initialize tracing for tests; safe to call more than once.
pub fn init_test() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(filter("debug"))
        .try_init();
}
