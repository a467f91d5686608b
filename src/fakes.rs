/// In-memory collaborators shared by the unit tests.

use crate::agent::{Agent, AgentSettings, Collaborators};
use crate::capability::CapabilityError;
use crate::catalog::ActionCatalog;
use crate::channel::{Delivery, DeliveryId, PollError, RemoteChannel, SubmitError};
use crate::clock::{Clock, SystemClock};
use crate::haptics::{HapticError, Haptics};
use crate::poll_loop::LoopTimings;
use crate::status::StatusDisplay;
use crate::wake::KeepAwake;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

pub fn delivery(id: &str, action: &str) -> Delivery {
    Delivery { id: DeliveryId::new(id), action: action.to_string() }
}

/// Virtual clock: `sleep` records the duration and advances time instantly.
pub struct FakeClock {
    origin: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

/// Replays a fixed sequence of poll results, then reports "nothing new"
/// forever. If `stop` is set, it is raised once the script runs out.
pub struct ScriptedChannel {
    script: Mutex<VecDeque<Result<Option<Delivery>, PollError>>>,
    polls: AtomicUsize,
    submits: Mutex<Vec<String>>,
    stop: Option<Arc<AtomicBool>>,
    refuse_submits: bool,
}

impl ScriptedChannel {
    pub fn new(script: Vec<Result<Option<Delivery>, PollError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            polls: AtomicUsize::new(0),
            submits: Mutex::new(Vec::new()),
            stop: None,
            refuse_submits: false,
        }
    }

    pub fn stopping(script: Vec<Result<Option<Delivery>, PollError>>, stop: Arc<AtomicBool>) -> Self {
        Self { stop: Some(stop), ..Self::new(script) }
    }

    pub fn refusing_submits() -> Self {
        Self { refuse_submits: true, ..Self::new(Vec::new()) }
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn submits(&self) -> Vec<String> {
        self.submits.lock().unwrap().clone()
    }
}

impl RemoteChannel for ScriptedChannel {
    fn submit(&self, action: &str) -> Result<(), SubmitError> {
        if self.refuse_submits {
            return Err(SubmitError::ServerError(500));
        }
        self.submits.lock().unwrap().push(action.to_string());
        Ok(())
    }

    fn poll(&self) -> Result<Option<Delivery>, PollError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                if let Some(stop) = &self.stop {
                    stop.store(true, Ordering::SeqCst);
                }
                Ok(None)
            }
        }
    }
}

/// Records every successful pulse. Can fail on a given pulse index, or block
/// each pulse until the test releases it.
pub struct RecordingHaptics {
    pulses: Mutex<Vec<Duration>>,
    calls: AtomicUsize,
    fail_at: Option<usize>,
    gate: Option<(Mutex<mpsc::Sender<usize>>, Mutex<mpsc::Receiver<()>>)>,
}

impl RecordingHaptics {
    pub fn new() -> Self {
        Self {
            pulses: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_at: None,
            gate: None,
        }
    }

    pub fn failing_on(index: usize) -> Self {
        Self { fail_at: Some(index), ..Self::new() }
    }

    /// Returns the haptics, a receiver that yields each pulse index as it
    /// starts, and a sender that lets one pulse finish per message.
    pub fn gated() -> (Self, mpsc::Receiver<usize>, mpsc::Sender<()>) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let haptics = Self {
            gate: Some((Mutex::new(started_tx), Mutex::new(release_rx))),
            ..Self::new()
        };
        (haptics, started_rx, release_tx)
    }

    pub fn pulses(&self) -> Vec<Duration> {
        self.pulses.lock().unwrap().clone()
    }
}

impl Haptics for RecordingHaptics {
    fn pulse(&self, duration: Duration) -> Result<(), HapticError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(index) {
            return Err(HapticError::Unavailable("motor fault".into()));
        }
        if let Some((started, release)) = &self.gate {
            let _ = started.lock().unwrap().send(index);
            let _ = release.lock().unwrap().recv();
        }
        self.pulses.lock().unwrap().push(duration);
        Ok(())
    }
}

pub struct CountingWakeLock {
    acquired: AtomicUsize,
    released: AtomicUsize,
    refuse: bool,
}

impl CountingWakeLock {
    pub fn new() -> Self {
        Self { acquired: AtomicUsize::new(0), released: AtomicUsize::new(0), refuse: false }
    }

    pub fn refusing() -> Self {
        Self { refuse: true, ..Self::new() }
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl KeepAwake for CountingWakeLock {
    fn acquire(&self) -> Result<(), CapabilityError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(CapabilityError::Busy(PathBuf::from("fake.lock")));
        }
        Ok(())
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct RecordingStatus {
    shown: Mutex<Vec<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    refuse: bool,
}

impl RecordingStatus {
    pub fn new() -> Self {
        Self {
            shown: Mutex::new(Vec::new()),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            refuse: false,
        }
    }

    pub fn refusing() -> Self {
        Self { refuse: true, ..Self::new() }
    }

    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl StatusDisplay for RecordingStatus {
    fn open(&self) -> Result<(), CapabilityError> {
        if self.refuse {
            return Err(CapabilityError::Busy(PathBuf::from("fake.status")));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn show(&self, text: &str) {
        self.shown.lock().unwrap().push(text.to_string());
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Listener over fakes with millisecond timings and a real clock.
pub fn fake_agent(wake: Arc<CountingWakeLock>) -> Arc<Agent> {
    let deps = Collaborators {
        channel: Arc::new(ScriptedChannel::new(vec![])),
        haptics: Arc::new(RecordingHaptics::new()),
        keep_awake: wake,
        display: Arc::new(RecordingStatus::new()),
        clock: Arc::new(SystemClock),
    };
    let settings = AgentSettings {
        timings: LoopTimings {
            fast: Duration::from_millis(1),
            backoff_base: Duration::from_millis(1),
            backoff_cap: Duration::from_millis(4),
        },
        pulse_gap: Duration::from_millis(1),
        status_revert: Duration::from_secs(60),
    };
    Arc::new(Agent::new(deps, Arc::new(ActionCatalog::default()), settings))
}
