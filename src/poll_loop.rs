/// Poll loop: the listener's single worker.
///
/// Each cycle:
///   1. poll the remote channel (bounded by the channel's timeout)
///   2. new id       → remember it, play the pattern inline, show "Received: X"
///      same id/none → nothing
///      failure      → consecutive_failures += 1
///   3. any success resets consecutive_failures
///   4. pause: fast interval when healthy, else min(base * 2^failures, cap)
///
/// The stop flag is checked between cycles only. An in-flight poll or
/// pattern always runs to completion.
///
/// De-duplication is by id, not content: sending the same action twice is
/// two deliveries. If the id changes twice between two polls the middle one
/// is never seen.

use crate::catalog::ActionCatalog;
use crate::channel::{Delivery, DeliveryId, PollError, RemoteChannel};
use crate::clock::Clock;
use crate::engine::{Execution, ExecutionEngine};
use crate::status::StatusReporter;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Sleep intervals between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTimings {
    pub fast: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for LoopTimings {
    fn default() -> Self {
        Self {
            fast: Duration::from_millis(200),
            backoff_base: Duration::from_millis(500),
            backoff_cap: Duration::from_secs(5),
        }
    }
}

impl LoopTimings {
    /// Pause before the next cycle given the current failure streak.
    pub fn pause(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            self.fast
        } else {
            backoff_delay(consecutive_failures, self.backoff_base, self.backoff_cap)
        }
    }
}

/// `min(base * 2^failures, cap)` without overflowing for long outages.
pub fn backoff_delay(failures: u32, base: Duration, cap: Duration) -> Duration {
    if failures >= 32 {
        return cap;
    }
    base.saturating_mul(1u32 << failures).min(cap)
}

/// What one cycle observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// New id with a known action; the pattern was run.
    Delivered(Execution),
    /// New id but the action is not in the catalog; nothing was played.
    Unplayable,
    NoChange,
    Failed,
}

pub struct PollLoop {
    channel: Arc<dyn RemoteChannel>,
    catalog: Arc<ActionCatalog>,
    engine: ExecutionEngine,
    status: StatusReporter,
    clock: Arc<dyn Clock>,
    timings: LoopTimings,
    /// None until the first delivery of this run.
    last_seen: Option<DeliveryId>,
    consecutive_failures: u32,
}

impl PollLoop {
    pub fn new(
        channel: Arc<dyn RemoteChannel>,
        catalog: Arc<ActionCatalog>,
        engine: ExecutionEngine,
        status: StatusReporter,
        clock: Arc<dyn Clock>,
        timings: LoopTimings,
    ) -> Self {
        Self {
            channel,
            catalog,
            engine,
            status,
            clock,
            timings,
            last_seen: None,
            consecutive_failures: 0,
        }
    }

    #[cfg(test)]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Pause to take before the next cycle.
    pub fn next_pause(&self) -> Duration {
        self.timings.pause(self.consecutive_failures)
    }

    /// Run cycles until `stop` is observed between cycles.
    pub fn run(&mut self, stop: &AtomicBool) {
        log::info!("Polling loop started");
        self.status.idle();
        while !stop.load(Ordering::SeqCst) {
            self.status.tick();
            self.cycle();
            if stop.load(Ordering::SeqCst) {
                break;
            }
            self.clock.sleep(self.next_pause());
        }
        log::info!("Polling loop stopped");
    }

    /// One poll → (maybe) execute step.
    pub fn cycle(&mut self) -> CycleOutcome {
        match self.channel.poll() {
            Ok(Some(delivery)) if self.last_seen.as_ref() != Some(&delivery.id) => {
                self.consecutive_failures = 0;
                self.last_seen = Some(delivery.id.clone());
                self.accept(delivery)
            }
            Ok(_) => {
                self.consecutive_failures = 0;
                CycleOutcome::NoChange
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.log_failure(&e);
                CycleOutcome::Failed
            }
        }
    }

    fn accept(&mut self, delivery: Delivery) -> CycleOutcome {
        let Some(pattern) = self.catalog.get(&delivery.action) else {
            log::warn!("Delivery {}: unknown action '{}', ignoring", delivery.id, delivery.action);
            return CycleOutcome::Unplayable;
        };
        log::info!("Delivery {}: action '{}'", delivery.id, delivery.action);
        let execution = self.engine.run(&delivery.action, pattern);
        if let Execution::Aborted { at } = execution {
            log::warn!(
                "Delivery {}: '{}' stopped after {at} of {} pulse(s)",
                delivery.id,
                delivery.action,
                pattern.pulses().len()
            );
        }
        self.status.delivered(&delivery.action);
        CycleOutcome::Delivered(execution)
    }

    fn log_failure(&self, e: &PollError) {
        let n = self.consecutive_failures;
        let wait = self.next_pause().as_millis();
        match e {
            PollError::Timeout => log::warn!("Poll timeout (failure {n}), retrying in {wait}ms"),
            PollError::Unreachable(msg) => {
                log::warn!("Server unreachable (failure {n}), retrying in {wait}ms: {msg}")
            }
            PollError::ServerError(code) => {
                log::warn!("Server response {code} (failure {n}), retrying in {wait}ms")
            }
            PollError::MalformedResponse(msg) => {
                log::warn!("Malformed poll response (failure {n}), retrying in {wait}ms: {msg}")
            }
        }
    }
}
