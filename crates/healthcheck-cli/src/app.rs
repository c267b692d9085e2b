//! Wires the configuration, scheduler and reporters together.

use crate::availability::{AvailabilityTracker, DomainAvailability};
use crate::config::{Config, OutputFormat};
use crate::http_server::MetricsServer;
use crate::metrics::MetricsRegistry;
use crate::reporter::{JsonReporter, LogReporter};
use healthcheck::{CancellationToken, FanoutReporter, HttpProber, Reporter, Scheduler};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Health checking application
pub struct HealthcheckApp {
    config: Config,
}

impl HealthcheckApp {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Check endpoints until `stop` is cancelled.
    ///
    /// Returns the availability accumulated over the whole run.
    pub async fn run(self, stop: CancellationToken) -> common::Result<Vec<DomainAvailability>> {
        let outcome = self.config.load_descriptors()?;
        if !outcome.rejected.is_empty() {
            info!(rejected = outcome.rejected.len(), "Some endpoints were skipped");
        }
        let descriptors = outcome.descriptors;

        let scheduler = Arc::new(Scheduler::new(Arc::new(HttpProber::new()?)));
        let availability = Arc::new(AvailabilityTracker::new(&descriptors));

        let metrics = if self.config.metrics.enabled {
            let registry = Arc::new(MetricsRegistry::new());
            registry.track_endpoints(&descriptors);
            info!("Metrics enabled on {}", self.config.metrics.listen_addr);
            Some(registry)
        } else {
            None
        };

        for descriptor in descriptors {
            scheduler.add(descriptor)?;
        }

        let reporting = &self.config.reporting;
        let console: Arc<dyn Reporter> = match reporting.format {
            OutputFormat::Text => Arc::new(LogReporter::new(reporting.every_tick)),
            OutputFormat::Json => Arc::new(JsonReporter::stdout(reporting.every_tick)),
        };
        let mut reporter = FanoutReporter::new()
            .with(console)
            .with(availability.clone());

        // Helper tasks stop with the scheduler, not only with the caller
        let stop = stop.child_token();
        let mut tasks = JoinSet::new();

        if let Some(registry) = metrics {
            reporter = reporter.with(registry.clone());
            let server = MetricsServer::new(
                registry,
                scheduler.clone(),
                self.config.metrics.listen_addr.clone(),
            );
            let stop = stop.clone();
            tasks.spawn(async move {
                if let Err(e) = server.run(stop).await {
                    error!(error = %e, "Metrics server error");
                }
            });
        }

        {
            let availability = availability.clone();
            let every = reporting.summary_interval;
            let stop = stop.clone();
            tasks.spawn(async move { availability.run(every, stop).await });
        }

        info!(endpoints = scheduler.len(), "Starting health checks");
        let result = scheduler.run(Arc::new(reporter), stop.clone()).await;

        stop.cancel();
        while tasks.join_next().await.is_some() {}
        result?;

        availability.log_summary();
        Ok(availability.summary())
    }
}

/// Process exit status for a failed run.
///
/// Internal errors use `EX_SOFTWARE` so they stand apart from bad input.
pub fn exit_code(err: &common::Error) -> i32 {
    if err.is_fatal() { 70 } else { 1 }
}

/// Cancel `stop` on Ctrl-C or SIGTERM
pub async fn shutdown_signal(stop: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = stop.cancelled() => return,
    }

    info!("Program stopped by user");
    stop.cancel();
}
