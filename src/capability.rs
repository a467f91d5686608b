/// Device capabilities held for the lifetime of a listener run, and the guard
/// that gives them back.

use crate::status::StatusDisplay;
use crate::wake::KeepAwake;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("{0} is held by another listener")]
    Busy(PathBuf),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Command(#[from] crate::shell::ShellError),
}

/// Owns the acquired keep-awake and status display. Dropping it releases both,
/// whichever way the worker thread exits (including unwinding).
pub struct CapabilityGuard {
    keep_awake: Arc<dyn KeepAwake>,
    display: Arc<dyn StatusDisplay>,
}

impl CapabilityGuard {
    /// Acquire keep-awake, then the status display. If the display fails the
    /// keep-awake is released before returning.
    pub fn acquire(
        keep_awake: Arc<dyn KeepAwake>,
        display: Arc<dyn StatusDisplay>,
    ) -> Result<Self, AcquireError> {
        keep_awake.acquire().map_err(AcquireError::KeepAwake)?;
        if let Err(e) = display.open() {
            keep_awake.release();
            return Err(AcquireError::StatusDisplay(e));
        }
        log::info!("Keep-awake and status display acquired");
        Ok(Self { keep_awake, display })
    }
}

impl Drop for CapabilityGuard {
    fn drop(&mut self) {
        self.display.close();
        self.keep_awake.release();
        log::info!("Keep-awake and status display released");
    }
}

/// Which capability could not be acquired.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("cannot keep device awake: {0}")]
    KeepAwake(#[source] CapabilityError),
    #[error("cannot open status display: {0}")]
    StatusDisplay(#[source] CapabilityError),
}
