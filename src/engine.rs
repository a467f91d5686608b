/// Execution engine: plays a pattern as pulse / gap / pulse / ... on the haptics driver.
///
/// Blocking. The poll loop calls it inline so two patterns can never overlap.
/// A driver error aborts the rest of the pattern and is logged here; it never
/// reaches the poll cycle.

use crate::catalog::Pattern;
use crate::clock::Clock;
use crate::haptics::Haptics;
use std::sync::Arc;
use std::time::Duration;

/// How a pattern run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    Completed,
    /// Driver failed on pulse `at` (0-based); later pulses were skipped.
    Aborted { at: usize },
}

pub struct ExecutionEngine {
    haptics: Arc<dyn Haptics>,
    clock: Arc<dyn Clock>,
    gap: Duration,
}

impl ExecutionEngine {
    pub fn new(haptics: Arc<dyn Haptics>, clock: Arc<dyn Clock>, gap: Duration) -> Self {
        Self { haptics, clock, gap }
    }

    pub fn run(&self, key: &str, pattern: &Pattern) -> Execution {
        log::info!(
            "Playing '{key}': {} pulse(s), {}ms",
            pattern.pulses().len(),
            pattern.span(self.gap).as_millis()
        );
        for (i, &duration) in pattern.pulses().iter().enumerate() {
            if i > 0 {
                self.clock.sleep(self.gap);
            }
            if let Err(e) = self.haptics.pulse(duration) {
                log::error!("Vibration error on pulse {} of '{key}': {e}", i + 1);
                return Execution::Aborted { at: i };
            }
            log::debug!("  pulse {}: {}ms", i + 1, duration.as_millis());
            self.clock.sleep(duration);
        }
        Execution::Completed
    }
}
