/// Listener lifecycle: Stopped → Starting → Running → Stopping → Stopped.
///
/// `start` acquires keep-awake and the status display, then runs the poll loop
/// on a dedicated `poll-loop` thread. The acquired capabilities move into
/// that thread inside a guard, so they are released however the thread ends.
///
/// `start` and `stop` are both idempotent. Only one run is ever in flight.
/// `stop` must not be called from the poll-loop thread itself.

use crate::capability::{AcquireError, CapabilityGuard};
use crate::catalog::ActionCatalog;
use crate::channel::RemoteChannel;
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, HapticsBackend, KeepAwakeBackend, StatusBackend};
use crate::engine::ExecutionEngine;
use crate::haptics::{CommandHaptics, Haptics, LogHaptics};
use crate::poll_loop::{LoopTimings, PollLoop};
use crate::status::{FileStatus, LogStatus, StatusDisplay, StatusReporter, STOPPED_TEXT};
use crate::wake::{CommandWakeLock, KeepAwake, LockFileWakeLock, NoWakeLock};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Stopped => f.write_str("stopped"),
            AgentState::Starting => f.write_str("starting"),
            AgentState::Running => f.write_str("running"),
            AgentState::Stopping => f.write_str("stopping"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Capability(#[from] AcquireError),
    #[error("failed to spawn poll-loop thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("listener task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Everything the listener talks to.
pub struct Collaborators {
    pub channel: Arc<dyn RemoteChannel>,
    pub haptics: Arc<dyn Haptics>,
    pub keep_awake: Arc<dyn KeepAwake>,
    pub display: Arc<dyn StatusDisplay>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Pick the configured drivers around an existing channel.
    pub fn from_config(cfg: &Config, channel: Arc<dyn RemoteChannel>) -> Self {
        let state_dir = Path::new(&cfg.state_dir);
        let haptics: Arc<dyn Haptics> = match cfg.haptics.backend {
            HapticsBackend::Log => Arc::new(LogHaptics),
            HapticsBackend::Command => Arc::new(CommandHaptics::new(cfg.haptics.command.clone())),
        };
        let keep_awake: Arc<dyn KeepAwake> = match cfg.keep_awake.backend {
            KeepAwakeBackend::LockFile => Arc::new(LockFileWakeLock::new(state_dir)),
            KeepAwakeBackend::Command => Arc::new(CommandWakeLock::new(
                cfg.keep_awake.acquire_command.clone(),
                cfg.keep_awake.release_command.clone(),
            )),
            KeepAwakeBackend::None => Arc::new(NoWakeLock),
        };
        let display: Arc<dyn StatusDisplay> = match cfg.status.backend {
            StatusBackend::Log => Arc::new(LogStatus),
            StatusBackend::File => Arc::new(FileStatus::new(state_dir)),
        };
        Self { channel, haptics, keep_awake, display, clock: Arc::new(SystemClock) }
    }
}

/// Timings the listener runs with.
#[derive(Debug, Clone, Copy)]
pub struct AgentSettings {
    pub timings: LoopTimings,
    pub pulse_gap: Duration,
    pub status_revert: Duration,
}

impl AgentSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            timings: LoopTimings {
                fast: Duration::from_millis(cfg.fast_poll_ms),
                backoff_base: Duration::from_millis(cfg.backoff_base_ms),
                backoff_cap: Duration::from_millis(cfg.backoff_cap_ms),
            },
            pulse_gap: Duration::from_millis(cfg.pulse_gap_ms),
            status_revert: Duration::from_millis(cfg.status_revert_ms),
        }
    }
}

struct Inner {
    state: AgentState,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

pub struct Agent {
    deps: Collaborators,
    catalog: Arc<ActionCatalog>,
    settings: AgentSettings,
    status_tx: Arc<watch::Sender<String>>,
    inner: Mutex<Inner>,
}

impl Agent {
    pub fn new(deps: Collaborators, catalog: Arc<ActionCatalog>, settings: AgentSettings) -> Self {
        let (status_tx, _) = watch::channel(STOPPED_TEXT.to_string());
        Self {
            deps,
            catalog,
            settings,
            status_tx: Arc::new(status_tx),
            inner: Mutex::new(Inner {
                state: AgentState::Stopped,
                stop: Arc::new(AtomicBool::new(false)),
                worker: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> AgentState {
        self.lock().state
    }

    /// Current status line.
    pub fn status(&self) -> String {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.status_tx.subscribe()
    }

    /// Start listening. No-op unless Stopped. On failure the agent stays Stopped
    /// and nothing stays acquired.
    pub fn start(&self) -> Result<(), AgentError> {
        let mut inner = self.lock();
        if inner.state != AgentState::Stopped {
            log::debug!("start() ignored: listener is {}", inner.state);
            return Ok(());
        }
        inner.state = AgentState::Starting;
        log::info!("Starting listener...");

        let guard = match CapabilityGuard::acquire(
            Arc::clone(&self.deps.keep_awake),
            Arc::clone(&self.deps.display),
        ) {
            Ok(g) => g,
            Err(e) => {
                log::error!("Listener failed to start: {e}");
                inner.state = AgentState::Stopped;
                return Err(e.into());
            }
        };

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let mut poll_loop = self.build_loop();
        let spawned = std::thread::Builder::new()
            .name("poll-loop".into())
            .spawn(move || {
                let _guard = guard;
                poll_loop.run(&stop_flag);
            });

        match spawned {
            Ok(handle) => {
                inner.stop = stop;
                inner.worker = Some(handle);
                inner.state = AgentState::Running;
                log::info!("Listener running");
                Ok(())
            }
            Err(e) => {
                log::error!("Listener failed to start: {e}");
                inner.state = AgentState::Stopped;
                Err(AgentError::Spawn(e))
            }
        }
    }

    /// Stop listening. No-op unless Running. Waits for the current cycle,
    /// including a pattern being played, to finish.
    pub fn stop(&self) {
        let worker = {
            let mut inner = self.lock();
            if inner.state != AgentState::Running {
                log::debug!("stop() ignored: listener is {}", inner.state);
                return;
            }
            inner.state = AgentState::Stopping;
            inner.stop.store(true, Ordering::SeqCst);
            inner.worker.take()
        };

        log::info!("Stopping listener...");
        if let Some(handle) = worker {
            if handle.join().is_err() {
                log::error!("Polling loop panicked");
            }
        }
        self.status_tx.send_replace(STOPPED_TEXT.to_string());
        self.lock().state = AgentState::Stopped;
        log::info!("Listener stopped");
    }

    fn build_loop(&self) -> PollLoop {
        let engine = ExecutionEngine::new(
            Arc::clone(&self.deps.haptics),
            Arc::clone(&self.deps.clock),
            self.settings.pulse_gap,
        );
        let status = StatusReporter::new(
            Arc::clone(&self.deps.display),
            Arc::clone(&self.status_tx),
            Arc::clone(&self.deps.clock),
            self.settings.status_revert,
        );
        PollLoop::new(
            Arc::clone(&self.deps.channel),
            Arc::clone(&self.catalog),
            engine,
            status,
            Arc::clone(&self.deps.clock),
            self.settings.timings,
        )
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        self.stop();
    }
}
