//! Console reporters: tracing text output and JSON lines

use chrono::{DateTime, SecondsFormat, Utc};
use healthcheck::{Event, Reporter, State};
use serde_json::{Value, json};
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;
use tracing::{info, warn};

fn rfc3339(timestamp: SystemTime) -> String {
    DateTime::<Utc>::from(timestamp).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Writes events through `tracing`
#[derive(Debug, Default)]
pub struct LogReporter {
    every_tick: bool,
}

impl LogReporter {
    pub fn new(every_tick: bool) -> Self {
        Self { every_tick }
    }
}

impl Reporter for LogReporter {
    fn report(&self, event: &Event) {
        match event {
            Event::Transition(t) if t.to == State::Up => {
                info!(endpoint = %t.endpoint_id, from = %t.from, reason = %t.reason, "{} is UP", t.endpoint_id);
            }
            Event::Transition(t) => {
                warn!(endpoint = %t.endpoint_id, from = %t.from, reason = %t.reason, "{} is DOWN", t.endpoint_id);
            }
            Event::Verdict(v) if self.every_tick => {
                info!(
                    endpoint = %v.endpoint_id,
                    verdict = %v.verdict,
                    status = ?v.status_code,
                    latency_ms = v.latency.as_millis() as u64,
                    consecutive_failures = v.consecutive_failures,
                    reason = %v.reason,
                    "Probe verdict"
                );
            }
            Event::Verdict(_) => {}
        }
    }
}

/// Writes one JSON object per event line
pub struct JsonReporter<W: Write + Send> {
    out: Mutex<W>,
    every_tick: bool,
}

impl JsonReporter<io::Stdout> {
    pub fn stdout(every_tick: bool) -> Self {
        Self::new(io::stdout(), every_tick)
    }
}

impl<W: Write + Send> JsonReporter<W> {
    pub fn new(out: W, every_tick: bool) -> Self {
        Self {
            out: Mutex::new(out),
            every_tick,
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// The JSON line for `event`, if it should be written at all
    fn line(&self, event: &Event) -> Option<Value> {
        match event {
            Event::Transition(t) => Some(json!({
                "type": "transition",
                "endpoint": t.endpoint_id,
                "timestamp": rfc3339(t.timestamp),
                "from": t.from,
                "to": t.to,
                "reason": t.reason,
            })),
            Event::Verdict(v) if self.every_tick => Some(json!({
                "type": "verdict",
                "endpoint": v.endpoint_id,
                "timestamp": rfc3339(v.timestamp),
                "verdict": v.verdict,
                "status_code": v.status_code,
                "latency_ms": v.latency.as_millis() as u64,
                "consecutive_failures": v.consecutive_failures,
                "reason": v.reason,
            })),
            Event::Verdict(_) => None,
        }
    }
}

impl<W: Write + Send> Reporter for JsonReporter<W> {
    fn report(&self, event: &Event) {
        let Some(line) = self.line(event) else {
            return;
        };

        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let written = serde_json::to_writer(&mut *out, &line)
            .map_err(io::Error::from)
            .and_then(|()| out.write_all(b"\n"))
            .and_then(|()| out.flush());
        if let Err(e) = written {
            tracing::debug!(error = %e, "Failed to write event");
        }
    }
}
