//! Per-endpoint probe scheduling.
//!
//! Every endpoint gets its own tokio task. A task sleeps until its next tick,
//! probes, evaluates the result, reports, and computes the following tick
//! from the start of the probe it just ran. A probe that overruns the
//! interval defers the next tick instead of queueing missed ones, so probes
//! for one endpoint never overlap, while different endpoints never wait on
//! each other.

use crate::descriptor::{DescriptorError, EndpointConfig, EndpointDescriptor};
use crate::evaluator::evaluate;
use crate::probe::Prober;
use crate::reporter::Reporter;
use crate::types::{EndpointId, EndpointStatus, Event, HealthState, ProbeResult};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Errors returned when registering endpoints
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("endpoints cannot be added while the scheduler is running")]
    Running,
}

impl From<SchedulerError> for common::Error {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::Descriptor(e) => e.into(),
            other @ SchedulerError::Running => common::Error::internal(other),
        }
    }
}

/// One scheduled endpoint.
///
/// The state lock is written only by the worker that owns the endpoint.
#[derive(Clone)]
struct Entry {
    descriptor: Arc<EndpointDescriptor>,
    state: Arc<RwLock<HealthState>>,
}

/// Clears the running flag when `run` returns or its future is dropped
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the endpoint table and drives probes
pub struct Scheduler {
    prober: Arc<dyn Prober>,
    entries: DashMap<EndpointId, Entry>,
    running: AtomicBool,
}

impl Scheduler {
    /// Create an empty scheduler
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self {
            prober,
            entries: DashMap::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Register a validated endpoint; its state starts as `Unknown`
    pub fn add(&self, descriptor: EndpointDescriptor) -> Result<(), SchedulerError> {
        if self.running.load(Ordering::Acquire) {
            return Err(SchedulerError::Running);
        }

        match self.entries.entry(descriptor.id().to_string()) {
            MapEntry::Occupied(occupied) => {
                Err(DescriptorError::DuplicateId(occupied.key().clone()).into())
            }
            MapEntry::Vacant(vacant) => {
                debug!(endpoint = descriptor.id(), url = %descriptor.url(), "Adding endpoint");
                vacant.insert(Entry {
                    descriptor: Arc::new(descriptor),
                    state: Arc::new(RwLock::new(HealthState::default())),
                });
                Ok(())
            }
        }
    }

    /// Validate a raw record and register it
    pub fn add_config(&self, config: &EndpointConfig) -> Result<(), SchedulerError> {
        self.add(config.build()?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Current state of one endpoint
    pub async fn state(&self, id: &str) -> Option<HealthState> {
        let entry = self.entries.get(id).map(|e| e.value().clone())?;
        let state = entry.state.read().await.clone();
        Some(state)
    }

    /// Snapshot of every endpoint, sorted by id
    pub async fn statuses(&self) -> Vec<EndpointStatus> {
        let entries: Vec<Entry> = self.entries.iter().map(|e| e.value().clone()).collect();

        let mut statuses = futures::future::join_all(entries.into_iter().map(|entry| async move {
            let state = entry.state.read().await.clone();
            EndpointStatus {
                endpoint_id: entry.descriptor.id().to_string(),
                url: entry.descriptor.url().to_string(),
                availability: state.availability(),
                state,
            }
        }))
        .await;
        statuses.sort_by(|a, b| a.endpoint_id.cmp(&b.endpoint_id));
        statuses
    }

    /// Probe every endpoint until `stop` is cancelled.
    ///
    /// After cancellation no new probe starts; probes already in flight are
    /// given up to their timeout to finish and are still reported. Returns
    /// an internal error if an endpoint worker panics.
    pub async fn run(&self, reporter: Arc<dyn Reporter>, stop: CancellationToken) -> common::Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(common::Error::internal("scheduler is already running"));
        }
        let _running = RunningGuard(&self.running);

        self.run_workers(reporter, stop).await
    }

    async fn run_workers(&self, reporter: Arc<dyn Reporter>, stop: CancellationToken) -> common::Result<()> {
        let stop = stop.child_token();
        let entries: Vec<Entry> = self.entries.iter().map(|e| e.value().clone()).collect();

        info!(endpoints = entries.len(), "Scheduler started");
        if entries.is_empty() {
            stop.cancelled().await;
            info!("Scheduler stopped");
            return Ok(());
        }

        let mut workers = JoinSet::new();
        for entry in entries {
            workers.spawn(run_endpoint(
                entry,
                self.prober.clone(),
                reporter.clone(),
                stop.clone(),
            ));
        }

        let mut failure = None;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Endpoint worker failed, stopping scheduler");
                stop.cancel();
                failure.get_or_insert_with(|| common::Error::internal(format!("endpoint worker failed: {e}")));
            }
        }

        info!("Scheduler stopped");
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Build a scheduler for `descriptors` and run it until `stop` is cancelled.
pub async fn run<I>(
    descriptors: I,
    prober: Arc<dyn Prober>,
    reporter: Arc<dyn Reporter>,
    stop: CancellationToken,
) -> common::Result<()>
where
    I: IntoIterator<Item = EndpointDescriptor>,
{
    let scheduler = Scheduler::new(prober);
    for descriptor in descriptors {
        scheduler.add(descriptor)?;
    }
    scheduler.run(reporter, stop).await
}

/// Resolves once `stop` has been cancelled for longer than `grace`
async fn abandoned(stop: &CancellationToken, grace: std::time::Duration) {
    stop.cancelled().await;
    sleep(grace).await;
}

async fn run_endpoint(
    entry: Entry,
    prober: Arc<dyn Prober>,
    reporter: Arc<dyn Reporter>,
    stop: CancellationToken,
) {
    let descriptor = entry.descriptor;
    let id = descriptor.id();
    let interval = descriptor.interval();
    let mut next_tick = Instant::now();

    debug!(endpoint = id, interval_ms = interval.as_millis(), "Endpoint worker started");

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = sleep_until(next_tick) => {}
        }

        let started = Instant::now();
        let result: ProbeResult = tokio::select! {
            result = prober.probe(&descriptor) => result,
            _ = abandoned(&stop, descriptor.timeout()) => {
                warn!(endpoint = id, "Abandoning in-flight probe after stop");
                break;
            }
        };

        let evaluation = {
            let mut state = entry.state.write().await;
            let evaluation = evaluate(&descriptor, &result, &state);
            *state = evaluation.state.clone();
            evaluation
        };

        if let Some(transition) = &evaluation.transition {
            debug!(endpoint = id, from = %transition.from, to = %transition.to, reason = %transition.reason, "State changed");
        }

        reporter.report(&Event::Verdict(evaluation.verdict_event(&result)));
        if let Some(transition) = evaluation.transition {
            reporter.report(&Event::Transition(transition));
        }

        next_tick = started + interval;
        if Instant::now() > next_tick {
            debug!(endpoint = id, overrun_ms = (Instant::now() - next_tick).as_millis(), "Probe overran its interval, next tick deferred");
        }
    }

    debug!(endpoint = id, "Endpoint worker stopped");
}
