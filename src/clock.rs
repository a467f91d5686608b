/// Time source for the poll loop and the execution engine.
///
/// Production uses the OS clock; tests inject a virtual clock so backoff and
/// pattern timing can be asserted without real sleeps.

use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
