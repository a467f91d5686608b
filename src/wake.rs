/// Keep-awake drivers: keep the listener scheduled while the device would
/// otherwise suspend it.
///
/// `LockFileWakeLock` exclusive OS lock on a file in the state dir; doubles as
///                    a single-listener guard across processes
/// `CommandWakeLock`  external acquire/release commands (termux-wake-lock)
/// `NoWakeLock`       nothing to hold (desktop)
///
/// `release` is idempotent for every driver.

use crate::capability::CapabilityError;
use crate::shell::run_shell;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

pub trait KeepAwake: Send + Sync {
    fn acquire(&self) -> Result<(), CapabilityError>;
    fn release(&self);
}

pub const LOCK_FILE_NAME: &str = "buzzlink.lock";

/// The file itself may outlive its holder; only the OS lock on it counts.
/// The kernel drops that lock when the holding process exits, however it exits.
pub struct LockFileWakeLock {
    path: PathBuf,
    held: Mutex<Option<File>>,
}

impl LockFileWakeLock {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(LOCK_FILE_NAME),
            held: Mutex::new(None),
        }
    }

    fn io_err(&self, source: std::io::Error) -> CapabilityError {
        CapabilityError::Io { path: self.path.clone(), source }
    }
}

fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl KeepAwake for LockFileWakeLock {
    fn acquire(&self) -> Result<(), CapabilityError> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if held.is_some() {
            return Ok(());
        }
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| CapabilityError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) if is_contended(&e) => return Err(CapabilityError::Busy(self.path.clone())),
                Err(e) => return Err(self.io_err(e)),
            }
        }
        // Informational only: who holds it.
        file.set_len(0)
            .and_then(|()| writeln!(file, "{}", std::process::id()))
            .map_err(|e| self.io_err(e))?;
        *held = Some(file);
        log::info!("Wake lock held ({})", self.path.display());
        Ok(())
    }

    fn release(&self) {
        let file = self.held.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(file) = file {
            if let Err(e) = file.set_len(0) {
                log::debug!("Failed to clear lock file {}: {e}", self.path.display());
            }
            if let Err(e) = FileExt::unlock(&file) {
                log::warn!("Failed to unlock {}: {e}", self.path.display());
            }
            log::info!("Wake lock released");
        }
    }
}

pub struct CommandWakeLock {
    acquire_cmd: String,
    release_cmd: String,
    held: AtomicBool,
}

impl CommandWakeLock {
    pub fn new(acquire_cmd: impl Into<String>, release_cmd: impl Into<String>) -> Self {
        Self {
            acquire_cmd: acquire_cmd.into(),
            release_cmd: release_cmd.into(),
            held: AtomicBool::new(false),
        }
    }
}

impl KeepAwake for CommandWakeLock {
    fn acquire(&self) -> Result<(), CapabilityError> {
        run_shell(&self.acquire_cmd)?;
        self.held.store(true, Ordering::SeqCst);
        log::info!("Wake lock acquired via '{}'", self.acquire_cmd);
        Ok(())
    }

    fn release(&self) {
        if self.held.swap(false, Ordering::SeqCst) {
            match run_shell(&self.release_cmd) {
                Ok(_) => log::info!("Wake lock released"),
                Err(e) => log::warn!("Wake lock release failed: {e}"),
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct NoWakeLock;

impl KeepAwake for NoWakeLock {
    fn acquire(&self) -> Result<(), CapabilityError> {
        Ok(())
    }

    fn release(&self) {}
}
