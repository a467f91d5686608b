/// Haptic drivers: the device side of a pulse.
///
/// `LogHaptics`     logs each pulse (desktop / dry run)
/// `CommandHaptics` runs a shell command per pulse, e.g. `termux-vibrate -f -d {ms}`

use crate::shell::{run_shell, ShellError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HapticError {
    #[error("haptic device unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Command(#[from] ShellError),
}

/// Something that can buzz.
pub trait Haptics: Send + Sync {
    /// Engage the motor for `duration`. May return before the motor stops;
    /// the caller owns pulse timing.
    fn pulse(&self, duration: Duration) -> Result<(), HapticError>;
}

#[derive(Debug, Default)]
pub struct LogHaptics;

impl Haptics for LogHaptics {
    fn pulse(&self, duration: Duration) -> Result<(), HapticError> {
        log::info!("Buzz {}ms", duration.as_millis());
        Ok(())
    }
}

pub struct CommandHaptics {
    template: String,
}

impl CommandHaptics {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }

    fn command_for(&self, duration: Duration) -> String {
        self.template.replace("{ms}", &duration.as_millis().to_string())
    }
}

impl Haptics for CommandHaptics {
    fn pulse(&self, duration: Duration) -> Result<(), HapticError> {
        if self.template.trim().is_empty() {
            return Err(HapticError::Unavailable("no haptics command configured".into()));
        }
        run_shell(&self.command_for(duration))?;
        Ok(())
    }
}
