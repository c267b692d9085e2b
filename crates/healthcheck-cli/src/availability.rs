//! Cumulative availability per domain.
//!
//! Endpoints are grouped by `host[:port]`. Every verdict counts towards its
//! domain, and the percentage of UP verdicts is logged periodically.

use dashmap::DashMap;
use healthcheck::{CancellationToken, EndpointDescriptor, EndpointId, Event, Reporter};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    up: u64,
    total: u64,
}

/// Availability of one domain so far
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainAvailability {
    pub domain: String,
    pub up: u64,
    pub total: u64,
    /// Rounded to the nearest whole percent
    pub percentage: u64,
}

/// Reporter that accumulates verdicts per domain
pub struct AvailabilityTracker {
    domain_of: HashMap<EndpointId, String>,
    /// Domains in the order their first endpoint was configured
    order: Vec<String>,
    counts: DashMap<String, Counts>,
}

impl AvailabilityTracker {
    pub fn new<'a>(descriptors: impl IntoIterator<Item = &'a EndpointDescriptor>) -> Self {
        let mut domain_of = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for descriptor in descriptors {
            let domain = descriptor.domain();
            if !order.contains(&domain) {
                order.push(domain.clone());
            }
            domain_of.insert(descriptor.id().to_string(), domain);
        }

        Self {
            domain_of,
            order,
            counts: DashMap::new(),
        }
    }

    /// Domains with at least one verdict
    pub fn summary(&self) -> Vec<DomainAvailability> {
        self.order
            .iter()
            .filter_map(|domain| {
                let counts = *self.counts.get(domain)?;
                if counts.total == 0 {
                    return None;
                }
                let percentage = (counts.up as f64 * 100.0 / counts.total as f64).round() as u64;
                Some(DomainAvailability {
                    domain: domain.clone(),
                    up: counts.up,
                    total: counts.total,
                    percentage,
                })
            })
            .collect()
    }

    pub fn log_summary(&self) {
        for entry in self.summary() {
            info!(
                domain = %entry.domain,
                availability = entry.percentage,
                up = entry.up,
                total = entry.total,
                "{} has {}% availability percentage",
                entry.domain,
                entry.percentage
            );
        }
    }

    /// Log the summary every `every` until `stop` is cancelled
    pub async fn run(&self, every: Duration, stop: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticker.tick() => self.log_summary(),
            }
        }

        debug!("Availability summary task stopped");
    }
}

impl Reporter for AvailabilityTracker {
    fn report(&self, event: &Event) {
        let Event::Verdict(verdict) = event else {
            return;
        };
        let Some(domain) = self.domain_of.get(&verdict.endpoint_id) else {
            debug!(endpoint = %verdict.endpoint_id, "Verdict for unknown endpoint");
            return;
        };

        let mut counts = self.counts.entry(domain.clone()).or_default();
        counts.total += 1;
        if verdict.verdict.is_up() {
            counts.up += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthcheck::{EndpointConfig, Verdict, VerdictEvent};
    use std::time::SystemTime;

    fn descriptor(id: &str, url: &str) -> EndpointDescriptor {
        EndpointConfig::new(url, Duration::from_secs(15))
            .with_id(id)
            .build()
            .unwrap()
    }

    fn verdict(id: &str, verdict: Verdict) -> Event {
        Event::Verdict(VerdictEvent {
            endpoint_id: id.to_string(),
            timestamp: SystemTime::now(),
            verdict,
            status_code: Some(200),
            latency: Duration::from_millis(10),
            reason: String::new(),
            consecutive_failures: 0,
        })
    }

    fn sample_tracker() -> AvailabilityTracker {
        let descriptors = [
            descriptor("index", "https://fetch.com/"),
            descriptor("careers", "https://fetch.com/careers"),
            descriptor("rewards", "https://www.fetchrewards.com/"),
            descriptor("local", "http://localhost:8080/health"),
        ];
        AvailabilityTracker::new(&descriptors)
    }

    #[test]
    fn test_groups_by_domain() {
        let tracker = sample_tracker();
        tracker.report(&verdict("index", Verdict::Up));
        tracker.report(&verdict("careers", Verdict::Down));
        tracker.report(&verdict("rewards", Verdict::Up));

        let summary = tracker.summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].domain, "fetch.com");
        assert_eq!((summary[0].up, summary[0].total), (1, 2));
        assert_eq!(summary[0].percentage, 50);
        assert_eq!(summary[1].domain, "www.fetchrewards.com");
        assert_eq!(summary[1].percentage, 100);
    }

    #[test]
    fn test_percentage_rounds_to_nearest() {
        let tracker = sample_tracker();
        for v in [Verdict::Up, Verdict::Up, Verdict::Down] {
            tracker.report(&verdict("index", v));
        }
        assert_eq!(tracker.summary()[0].percentage, 67);

        let tracker = sample_tracker();
        for v in [Verdict::Up, Verdict::Down, Verdict::Down] {
            tracker.report(&verdict("local", v));
        }
        let summary = tracker.summary();
        assert_eq!(summary[0].domain, "localhost:8080");
        assert_eq!(summary[0].percentage, 33);
    }

    #[test]
    fn test_transitions_and_unknown_endpoints_ignored() {
        let tracker = sample_tracker();
        tracker.report(&verdict("nobody", Verdict::Up));
        tracker.report(&Event::Transition(healthcheck::TransitionEvent {
            endpoint_id: "index".to_string(),
            from: healthcheck::State::Unknown,
            to: healthcheck::State::Up,
            timestamp: SystemTime::now(),
            reason: String::new(),
        }));
        assert!(tracker.summary().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_task_stops_on_cancel() {
        let tracker = std::sync::Arc::new(sample_tracker());
        tracker.report(&verdict("index", Verdict::Up));

        let stop = CancellationToken::new();
        let task = {
            let tracker = tracker.clone();
            let stop = stop.clone();
            tokio::spawn(async move { tracker.run(Duration::from_secs(15), stop).await })
        };

        tokio::time::sleep(Duration::from_secs(40)).await;
        stop.cancel();
        tokio_test::assert_ok!(task.await);
    }
}
