/// TOML configuration with sensible defaults.
/// No config file is required to run — defaults work out of the box.
///
/// Everything here is read once at startup and never reloaded: the endpoint,
/// the action patterns and the loop timings are deploy-time settings.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote endpoint shared by senders and listeners.
    pub endpoint: String,
    /// Upper bound on a single poll request.
    pub poll_timeout_ms: u64,
    /// Upper bound on a single submit request.
    pub submit_timeout_ms: u64,
    /// Pause between polls while the server is healthy.
    pub fast_poll_ms: u64,
    /// Backoff base: the first retry after a failure waits `2 * base`.
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    /// Pause inserted between consecutive pulses of a pattern.
    pub pulse_gap_ms: u64,
    /// How long "Received: X" stays on the status display before reverting.
    pub status_revert_ms: u64,
    /// Directory for the lock file and status file.
    pub state_dir: String,
    /// Action key → pulse durations in milliseconds.
    pub patterns: BTreeMap<String, Vec<u64>>,
    pub haptics: HapticsConfig,
    pub keep_awake: KeepAwakeConfig,
    pub status: StatusConfig,
}

/// Which haptic driver plays the pulses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HapticsBackend {
    Log,
    Command,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HapticsConfig {
    pub backend: HapticsBackend,
    /// Shell command run once per pulse; `{ms}` is replaced by the duration.
    pub command: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepAwakeBackend {
    LockFile,
    Command,
    None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeepAwakeConfig {
    pub backend: KeepAwakeBackend,
    pub acquire_command: String,
    pub release_command: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBackend {
    Log,
    File,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub backend: StatusBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "https://www.crashando.it/vibe/vibra.php".into(),
            poll_timeout_ms: 10_000,
            submit_timeout_ms: 5_000,
            fast_poll_ms: 200, // 5Hz
            backoff_base_ms: 500,
            backoff_cap_ms: 5_000,
            pulse_gap_ms: 200,
            status_revert_ms: 3_000,
            state_dir: default_state_dir(),
            patterns: default_patterns(),
            haptics: HapticsConfig::default(),
            keep_awake: KeepAwakeConfig::default(),
            status: StatusConfig::default(),
        }
    }
}

impl Default for HapticsConfig {
    fn default() -> Self {
        Self {
            backend: HapticsBackend::Log,
            command: "termux-vibrate -f -d {ms}".into(),
        }
    }
}

impl Default for KeepAwakeConfig {
    fn default() -> Self {
        Self {
            backend: KeepAwakeBackend::LockFile,
            acquire_command: "termux-wake-lock".into(),
            release_command: "termux-wake-unlock".into(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { backend: StatusBackend::Log }
    }
}

/// Built-in action alphabet: a → 1 pulse … d → 7 pulses.
pub fn default_patterns() -> BTreeMap<String, Vec<u64>> {
    [
        ("a", vec![400]),
        ("b", vec![400, 200, 400]),
        ("c", vec![400, 200, 400, 200, 400]),
        ("d", vec![400, 200, 400, 200, 400, 200, 400]),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn default_state_dir() -> String {
    std::env::temp_dir().to_string_lossy().into_owned()
}

impl Config {
    /// Load config from `explicit`, or the default config file path.
    /// Falls back to defaults if the file is missing or unparsable.
    pub fn load(explicit: Option<&Path>) -> Self {
        let config_path = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(config_file_path);
        let shown = config_path.display();
        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {shown}");
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse config file {shown}: {e}. Using defaults.");
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No config file found at {shown}. Using defaults.");
                Self::default()
            }
        }
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = std::env::var("BUZZLINK_CONFIG") {
        return PathBuf::from(path);
    }
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")));
    match base {
        Ok(dir) => dir.join("buzzlink").join("config.toml"),
        Err(_) => PathBuf::from("buzzlink.toml"),
    }
}
