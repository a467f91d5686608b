/// Sender side: publish an action for every listener to play.
///
/// `send` is fire-and-forget. Each call runs on its own blocking task and
/// reports back through an outcome channel, so the caller never waits on
/// the network.

use crate::catalog::{normalize_key, ActionCatalog};
use crate::channel::{RemoteChannel, SubmitError};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Result of one submit, as reported to the interactive surface.
#[derive(Debug)]
pub struct SendOutcome {
    pub key: String,
    pub result: Result<(), SubmitError>,
}

impl SendOutcome {
    /// One-line summary for the user.
    pub fn summary(&self) -> String {
        match &self.result {
            Ok(()) => format!("{} sent!", self.key.to_ascii_uppercase()),
            Err(e) => format!("Send {} failed: {e}", self.key.to_ascii_uppercase()),
        }
    }
}

#[derive(Clone)]
pub struct Controller {
    channel: Arc<dyn RemoteChannel>,
    catalog: Arc<ActionCatalog>,
}

impl Controller {
    pub fn new(channel: Arc<dyn RemoteChannel>, catalog: Arc<ActionCatalog>) -> Self {
        Self { channel, catalog }
    }

    /// Validate `raw` against the catalog. Returns the normalized key.
    pub fn resolve(&self, raw: &str) -> Result<String, SubmitError> {
        let key = normalize_key(raw);
        if self.catalog.contains(&key) {
            Ok(key)
        } else {
            Err(SubmitError::UnknownAction(raw.trim().to_string()))
        }
    }

    /// Submit and wait (blocking).
    pub fn send_blocking(&self, raw: &str) -> SendOutcome {
        let result = self.resolve(raw);
        let key = result.as_ref().ok().cloned().unwrap_or_else(|| raw.trim().to_string());
        let result = result.and_then(|k| {
            log::info!("Sending action '{k}'");
            self.channel.submit(&k)
        });
        if let Err(e) = &result {
            log::warn!("Send '{key}' failed: {e}");
        }
        SendOutcome { key, result }
    }

    /// Submit in the background; the outcome arrives on `outcomes`.
    /// Must be called from within a tokio runtime.
    pub fn send(&self, raw: &str, outcomes: mpsc::UnboundedSender<SendOutcome>) {
        let this = self.clone();
        let raw = raw.to_string();
        tokio::task::spawn_blocking(move || {
            let _ = outcomes.send(this.send_blocking(&raw));
        });
    }
}
