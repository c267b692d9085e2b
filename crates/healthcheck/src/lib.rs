//! Periodic HTTP endpoint health checking.
//!
//! This crate probes a set of independently configured HTTP endpoints, each
//! on its own cadence, and reports their availability:
//! - [`descriptor`]: validated endpoint configuration
//! - [`probe`]: one HTTP request per tick, failures captured as data
//! - [`evaluator`]: UP/DOWN verdicts and edge-triggered transitions
//! - [`scheduler`]: one task per endpoint, cooperative stop
//! - [`reporter`]: sinks receiving verdict and transition events
//!
//! # Example
//!
//! ```no_run
//! use healthcheck::{CancellationToken, ChannelReporter, EndpointConfig, HttpProber, Scheduler};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = Scheduler::new(Arc::new(HttpProber::new()?));
//! scheduler.add_config(
//!     &EndpointConfig::new("https://example.com/health", Duration::from_secs(15))
//!         .with_expected_status([200, 204]),
//! )?;
//!
//! let (reporter, mut events) = ChannelReporter::channel();
//! let stop = CancellationToken::new();
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//! });
//!
//! scheduler.run(Arc::new(reporter), stop).await?;
//! # Ok(())
//! # }
//! ```

pub mod descriptor;
pub mod evaluator;
pub mod probe;
pub mod reporter;
pub mod scheduler;
pub mod types;

pub use descriptor::{
    DescriptorError, EndpointConfig, EndpointDescriptor, LoadOutcome, LoadPolicy, RejectedEndpoint,
    load_descriptors,
};
pub use evaluator::{Evaluation, evaluate};
pub use probe::{HttpProber, Prober};
pub use reporter::{ChannelReporter, FanoutReporter, NullReporter, Reporter};
pub use scheduler::{Scheduler, SchedulerError, run};
pub use tokio_util::sync::CancellationToken;
pub use types::{
    EndpointId, EndpointStatus, Event, HealthState, ProbeErrorKind, ProbeFailure, ProbeResult, State,
    TransitionEvent, Verdict, VerdictEvent,
};
