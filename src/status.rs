/// Persistent status display and the subscribable status string.
///
/// The listener shows "Listening..." while idle and "Received: B" for a few
/// seconds after each delivery. The revert is checked at the top of each poll
/// cycle, so the loop never blocks on it.

use crate::capability::CapabilityError;
use crate::clock::Clock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;

pub const IDLE_TEXT: &str = "Listening...";
pub const STOPPED_TEXT: &str = "Stopped";

/// A surface that shows one short status line for as long as it is open.
pub trait StatusDisplay: Send + Sync {
    fn open(&self) -> Result<(), CapabilityError>;
    fn show(&self, text: &str);
    /// Idempotent.
    fn close(&self);
}

#[derive(Debug, Default)]
pub struct LogStatus;

impl StatusDisplay for LogStatus {
    fn open(&self) -> Result<(), CapabilityError> {
        Ok(())
    }

    fn show(&self, text: &str) {
        log::info!("Status: {text}");
    }

    fn close(&self) {}
}

pub const STATUS_FILE_NAME: &str = "buzzlink_status";

/// Writes the current line to `<state_dir>/buzzlink_status`; removed on close.
pub struct FileStatus {
    path: PathBuf,
    open: AtomicBool,
}

impl FileStatus {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(STATUS_FILE_NAME),
            open: AtomicBool::new(false),
        }
    }

    fn write(&self, text: &str) -> std::io::Result<()> {
        std::fs::write(&self.path, format!("{text}\n"))
    }
}

impl StatusDisplay for FileStatus {
    fn open(&self) -> Result<(), CapabilityError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| CapabilityError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        self.write("").map_err(|source| CapabilityError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn show(&self, text: &str) {
        if !self.open.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.write(text) {
            log::warn!("Failed to write status file {}: {e}", self.path.display());
        }
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Publishes status to the display and to subscribers, and reverts
/// delivery text to idle text after `revert_after`.
pub struct StatusReporter {
    display: Arc<dyn StatusDisplay>,
    tx: Arc<watch::Sender<String>>,
    clock: Arc<dyn Clock>,
    revert_after: Duration,
    revert_at: Option<Instant>,
}

impl StatusReporter {
    pub fn new(
        display: Arc<dyn StatusDisplay>,
        tx: Arc<watch::Sender<String>>,
        clock: Arc<dyn Clock>,
        revert_after: Duration,
    ) -> Self {
        Self { display, tx, clock, revert_after, revert_at: None }
    }

    fn publish(&self, text: &str) {
        self.display.show(text);
        self.tx.send_replace(text.to_string());
    }

    pub fn idle(&mut self) {
        self.revert_at = None;
        self.publish(IDLE_TEXT);
    }

    pub fn delivered(&mut self, key: &str) {
        self.publish(&format!("Received: {}", key.to_ascii_uppercase()));
        self.revert_at = Some(self.clock.now() + self.revert_after);
    }

    /// Revert to idle text once the delivery text has been up long enough.
    pub fn tick(&mut self) {
        if self.revert_at.is_some_and(|at| self.clock.now() >= at) {
            self.idle();
        }
    }
}
