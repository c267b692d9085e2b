//! Verdicts and edge-triggered state transitions.

use crate::descriptor::EndpointDescriptor;
use crate::types::{HealthState, ProbeResult, State, TransitionEvent, Verdict, VerdictEvent};

/// Output of [`evaluate`]
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub verdict: Verdict,
    /// Human-readable explanation of the verdict
    pub reason: String,
    pub state: HealthState,
    /// Present only when the verdict differs from the prior state
    pub transition: Option<TransitionEvent>,
}

impl Evaluation {
    /// Per-tick event describing this evaluation
    pub fn verdict_event(&self, result: &ProbeResult) -> VerdictEvent {
        VerdictEvent {
            endpoint_id: result.endpoint_id.clone(),
            timestamp: result.timestamp,
            verdict: self.verdict,
            status_code: result.status_code,
            latency: result.latency,
            reason: self.reason.clone(),
            consecutive_failures: self.state.consecutive_failures,
        }
    }
}

/// Classify a probe result against the descriptor's expectations.
pub fn verdict(descriptor: &EndpointDescriptor, result: &ProbeResult) -> (Verdict, String) {
    let Some(status) = result.status_code else {
        let reason = result
            .error
            .as_ref()
            .map(|e| e.kind.to_string())
            .unwrap_or_else(|| "no response".to_string());
        return (Verdict::Down, reason);
    };

    if !descriptor.expected_status().contains(&status) {
        return (Verdict::Down, format!("unexpected status {status}"));
    }

    if let Some(max) = descriptor.max_latency() {
        if result.latency >= max {
            return (
                Verdict::Down,
                format!(
                    "latency {}ms exceeds {}ms",
                    result.latency.as_millis(),
                    max.as_millis()
                ),
            );
        }
    }

    (Verdict::Up, format!("status {status}"))
}

/// Evaluate one probe result against the endpoint's prior state.
///
/// A transition is produced only when the verdict differs from
/// `prior.current`; the first observation (`Unknown`) always transitions.
pub fn evaluate(descriptor: &EndpointDescriptor, result: &ProbeResult, prior: &HealthState) -> Evaluation {
    let (verdict, reason) = verdict(descriptor, result);

    let mut state = prior.clone();
    state.current = verdict.into();
    state.last_checked = Some(result.timestamp);
    state.total_probes += 1;
    match verdict {
        Verdict::Up => {
            state.successful_probes += 1;
            state.consecutive_failures = 0;
        }
        Verdict::Down => {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        }
    }

    let transition = (state.current != prior.current).then(|| TransitionEvent {
        endpoint_id: result.endpoint_id.clone(),
        from: prior.current,
        to: state.current,
        timestamp: result.timestamp,
        reason: reason.clone(),
    });

    debug_assert!(state.current != State::Unknown);

    Evaluation {
        verdict,
        reason,
        state,
        transition,
    }
}
