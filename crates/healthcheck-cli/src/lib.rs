//! Command line health checker for HTTP endpoints.
//!
//! Reads a YAML list of endpoints, probes each one on its own interval and
//! reports state changes. Every summary interval it logs the cumulative
//! availability of each domain, and on Ctrl-C it stops the probes and logs a
//! final summary.
//!
//! # Components
//!
//! - **Config**: YAML document, defaults and validation
//! - **Reporters**: tracing or JSON-lines output, availability per domain,
//!   Prometheus metrics
//! - **MetricsServer**: optional `/metrics`, `/health` and `/status` endpoint

pub mod app;
pub mod availability;
pub mod cli;
pub mod config;
pub mod http_server;
pub mod metrics;
pub mod reporter;

pub use app::{HealthcheckApp, exit_code, shutdown_signal};
pub use availability::{AvailabilityTracker, DomainAvailability};
pub use cli::Cli;
pub use config::{Config, ConfigError, OutputFormat, check_config_path};
pub use http_server::MetricsServer;
pub use metrics::MetricsRegistry;
pub use reporter::{JsonReporter, LogReporter};
