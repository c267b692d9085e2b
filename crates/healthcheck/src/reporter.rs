//! Reporter sinks for verdict and transition events.

use crate::types::Event;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Receives every event emitted by the scheduler.
///
/// Called from endpoint workers, so implementations must not block for long:
/// a slow reporter delays that endpoint's next tick.
#[cfg_attr(test, mockall::automock)]
pub trait Reporter: Send + Sync {
    fn report(&self, event: &Event);
}

impl<R: Reporter + ?Sized> Reporter for Arc<R> {
    fn report(&self, event: &Event) {
        (**self).report(event)
    }
}

/// Forwards events into an unbounded channel
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelReporter {
    /// Create a reporter together with the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Reporter for ChannelReporter {
    fn report(&self, event: &Event) {
        if self.tx.send(event.clone()).is_err() {
            debug!(endpoint = event.endpoint_id(), "Event receiver dropped");
        }
    }
}

/// Sends each event to several reporters, in order
#[derive(Default)]
pub struct FanoutReporter {
    sinks: Vec<Arc<dyn Reporter>>,
}

impl FanoutReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn Reporter>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Reporter for FanoutReporter {
    fn report(&self, event: &Event) {
        for sink in &self.sinks {
            sink.report(event);
        }
    }
}

/// Discards every event
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _event: &Event) {}
}
