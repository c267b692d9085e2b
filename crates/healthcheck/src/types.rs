//! Probe results, health state and the events emitted to reporters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};

/// Endpoint identifier, unique within one scheduler.
pub type EndpointId = String;

/// Availability of an endpoint as tracked by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// No probe has completed yet
    Unknown,
    /// Last probe met the endpoint's expectations
    Up,
    /// Last probe failed or did not meet expectations
    Down,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Unknown => write!(f, "UNKNOWN"),
            State::Up => write!(f, "UP"),
            State::Down => write!(f, "DOWN"),
        }
    }
}

/// Classification of a single probe outcome.
///
/// There is no unknown verdict, so the evaluator can never move an endpoint
/// back to [`State::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Up,
    Down,
}

impl Verdict {
    pub fn is_up(self) -> bool {
        self == Verdict::Up
    }
}

impl From<Verdict> for State {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Up => State::Up,
            Verdict::Down => State::Down,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        State::from(*self).fmt(f)
    }
}

/// Why a probe produced no HTTP response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    Timeout,
    ConnectionRefused,
    DnsFailure,
    Other,
}

impl ProbeErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeErrorKind::Timeout => "timeout",
            ProbeErrorKind::ConnectionRefused => "connection_refused",
            ProbeErrorKind::DnsFailure => "dns_failure",
            ProbeErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network-level failure captured by the probe executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeFailure {
    pub kind: ProbeErrorKind,
    /// Underlying error text, for logs
    pub message: String,
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Outcome of one probe attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub endpoint_id: EndpointId,

    /// When the probe started
    pub timestamp: SystemTime,

    /// Response code; absent when no response was received
    pub status_code: Option<u16>,

    /// Time until the response arrived or the failure was detected
    pub latency: Duration,

    pub error: Option<ProbeFailure>,
}

impl ProbeResult {
    /// Create a result for a received response
    pub fn response(
        endpoint_id: impl Into<EndpointId>,
        timestamp: SystemTime,
        status_code: u16,
        latency: Duration,
    ) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            timestamp,
            status_code: Some(status_code),
            latency,
            error: None,
        }
    }

    /// Create a result for a request that failed before a response arrived
    pub fn failure(
        endpoint_id: impl Into<EndpointId>,
        timestamp: SystemTime,
        latency: Duration,
        kind: ProbeErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            timestamp,
            status_code: None,
            latency,
            error: Some(ProbeFailure {
                kind,
                message: message.into(),
            }),
        }
    }

    /// Create a timeout result
    pub fn timeout(endpoint_id: impl Into<EndpointId>, timestamp: SystemTime, latency: Duration) -> Self {
        Self::failure(
            endpoint_id,
            timestamp,
            latency,
            ProbeErrorKind::Timeout,
            "request timed out",
        )
    }
}

/// Mutable health of one endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthState {
    pub current: State,

    pub last_checked: Option<SystemTime>,

    pub consecutive_failures: u32,

    /// Probes evaluated so far
    pub total_probes: u64,

    /// Probes that produced an UP verdict
    pub successful_probes: u64,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            current: State::Unknown,
            last_checked: None,
            consecutive_failures: 0,
            total_probes: 0,
            successful_probes: 0,
        }
    }
}

impl HealthState {
    /// Percentage of UP verdicts, or `None` before the first probe
    pub fn availability(&self) -> Option<f64> {
        if self.total_probes == 0 {
            return None;
        }
        Some(self.successful_probes as f64 * 100.0 / self.total_probes as f64)
    }
}

/// Edge-triggered notification that an endpoint's availability changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub endpoint_id: EndpointId,
    pub from: State,
    pub to: State,
    pub timestamp: SystemTime,
    pub reason: String,
}

/// Per-tick outcome, emitted for every evaluated probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictEvent {
    pub endpoint_id: EndpointId,
    pub timestamp: SystemTime,
    pub verdict: Verdict,
    pub status_code: Option<u16>,
    pub latency: Duration,
    pub reason: String,
    pub consecutive_failures: u32,
}

/// Event delivered to a [`Reporter`](crate::reporter::Reporter)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Verdict(VerdictEvent),
    Transition(TransitionEvent),
}

impl Event {
    pub fn endpoint_id(&self) -> &str {
        match self {
            Event::Verdict(v) => &v.endpoint_id,
            Event::Transition(t) => &t.endpoint_id,
        }
    }

    pub fn is_transition(&self) -> bool {
        matches!(self, Event::Transition(_))
    }
}

/// Snapshot of one endpoint, as returned by the scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointStatus {
    pub endpoint_id: EndpointId,
    pub url: String,
    pub state: HealthState,
    /// Percentage of UP verdicts so far
    pub availability: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(State::Unknown.to_string(), "UNKNOWN");
        assert_eq!(State::Up.to_string(), "UP");
        assert_eq!(State::Down.to_string(), "DOWN");
        assert_eq!(Verdict::Down.to_string(), "DOWN");
    }

    #[test]
    fn test_error_kind_names() {
        assert_eq!(ProbeErrorKind::Timeout.to_string(), "timeout");
        assert_eq!(ProbeErrorKind::ConnectionRefused.to_string(), "connection_refused");
        assert_eq!(ProbeErrorKind::DnsFailure.to_string(), "dns_failure");
        assert_eq!(
            serde_json::to_string(&ProbeErrorKind::DnsFailure).unwrap(),
            "\"dns_failure\""
        );
    }

    #[test]
    fn test_health_state_starts_unknown() {
        let state = HealthState::default();
        assert_eq!(state.current, State::Unknown);
        assert!(state.last_checked.is_none());
        assert_eq!(state.availability(), None);
    }

    #[test]
    fn test_availability_percentage() {
        let state = HealthState {
            total_probes: 4,
            successful_probes: 3,
            ..HealthState::default()
        };
        assert_eq!(state.availability(), Some(75.0));
    }

    #[test]
    fn test_timeout_result() {
        let result = ProbeResult::timeout("api", SystemTime::now(), Duration::from_millis(500));
        assert!(result.status_code.is_none());
        assert_eq!(result.error.unwrap().kind, ProbeErrorKind::Timeout);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = Event::Transition(TransitionEvent {
            endpoint_id: "api".to_string(),
            from: State::Unknown,
            to: State::Up,
            timestamp: SystemTime::UNIX_EPOCH,
            reason: "status 200".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "transition");
        assert_eq!(json["from"], "unknown");
        assert_eq!(json["to"], "up");
    }
}
