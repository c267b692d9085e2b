//! Prometheus metrics for endpoint health checks.

use healthcheck::{EndpointDescriptor, Event, Reporter, State, TransitionEvent, VerdictEvent};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::fmt;

/// Labels for per-endpoint metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EndpointLabels {
    pub endpoint: String,
}

/// Labels for probe result metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProbeLabels {
    pub endpoint: String,
    /// Verdict (up, down)
    pub outcome: String,
}

/// Labels for state transition metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TransitionLabels {
    pub endpoint: String,
    pub from: String,
    pub to: String,
}

type HistogramFamily = Family<EndpointLabels, Histogram, fn() -> Histogram>;

/// Exponential buckets from 1ms to ~16s
fn latency_histogram() -> Histogram {
    Histogram::new(exponential_buckets(0.001, 2.0, 15))
}

fn state_value(state: State) -> i64 {
    match state {
        State::Unknown => 0,
        State::Up => 1,
        State::Down => 2,
    }
}

/// Metrics registry, fed as a [`Reporter`]
pub struct MetricsRegistry {
    registry: Registry,

    /// Probes evaluated, by verdict
    probes_total: Family<ProbeLabels, Counter>,
    /// Probe latency
    latency_seconds: HistogramFamily,
    /// Current state (0=unknown, 1=up, 2=down)
    state: Family<EndpointLabels, Gauge>,
    consecutive_failures: Family<EndpointLabels, Gauge>,
    transitions_total: Family<TransitionLabels, Counter>,
    /// Endpoints being checked
    endpoints: Gauge,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let probes_total = Family::<ProbeLabels, Counter>::default();
        registry.register(
            "healthcheck_probes",
            "Total probes evaluated",
            probes_total.clone(),
        );

        let latency_seconds = HistogramFamily::new_with_constructor(latency_histogram);
        registry.register(
            "healthcheck_probe_latency_seconds",
            "Probe latency in seconds",
            latency_seconds.clone(),
        );

        let state = Family::<EndpointLabels, Gauge>::default();
        registry.register(
            "healthcheck_endpoint_state",
            "Current endpoint state (0=unknown, 1=up, 2=down)",
            state.clone(),
        );

        let consecutive_failures = Family::<EndpointLabels, Gauge>::default();
        registry.register(
            "healthcheck_consecutive_failures",
            "Current consecutive failure count",
            consecutive_failures.clone(),
        );

        let transitions_total = Family::<TransitionLabels, Counter>::default();
        registry.register(
            "healthcheck_state_transitions",
            "Total endpoint state transitions",
            transitions_total.clone(),
        );

        let endpoints = Gauge::default();
        registry.register(
            "healthcheck_endpoints",
            "Number of endpoints being checked",
            endpoints.clone(),
        );

        Self {
            registry,
            probes_total,
            latency_seconds,
            state,
            consecutive_failures,
            transitions_total,
            endpoints,
        }
    }

    /// Register the endpoints up front so they show as unknown before the first probe
    pub fn track_endpoints<'a>(&self, descriptors: impl IntoIterator<Item = &'a EndpointDescriptor>) {
        let mut count = 0;
        for descriptor in descriptors {
            let labels = EndpointLabels {
                endpoint: descriptor.id().to_string(),
            };
            self.state.get_or_create(&labels).set(state_value(State::Unknown));
            count += 1;
        }
        self.endpoints.set(count);
    }

    fn record_verdict(&self, verdict: &VerdictEvent) {
        self.probes_total
            .get_or_create(&ProbeLabels {
                endpoint: verdict.endpoint_id.clone(),
                outcome: verdict.verdict.to_string().to_lowercase(),
            })
            .inc();

        let labels = EndpointLabels {
            endpoint: verdict.endpoint_id.clone(),
        };
        self.latency_seconds
            .get_or_create(&labels)
            .observe(verdict.latency.as_secs_f64());
        self.state
            .get_or_create(&labels)
            .set(state_value(verdict.verdict.into()));
        self.consecutive_failures
            .get_or_create(&labels)
            .set(i64::from(verdict.consecutive_failures));
    }

    fn record_transition(&self, transition: &TransitionEvent) {
        self.transitions_total
            .get_or_create(&TransitionLabels {
                endpoint: transition.endpoint_id.clone(),
                from: transition.from.to_string().to_lowercase(),
                to: transition.to.to_string().to_lowercase(),
            })
            .inc();
    }

    /// Encode all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<String, fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for MetricsRegistry {
    fn report(&self, event: &Event) {
        match event {
            Event::Verdict(verdict) => self.record_verdict(verdict),
            Event::Transition(transition) => self.record_transition(transition),
        }
    }
}
