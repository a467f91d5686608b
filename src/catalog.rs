/// Action catalog: maps an action key to its vibration pattern.
///
/// a → single pulse
/// b → 3 pulses
/// c → 5 pulses
/// d → 7 pulses
///
/// Keys are matched case-insensitively (`"B"` and `" b\n"` both resolve to `b`).

use std::collections::BTreeMap;
use std::time::Duration;

/// Ordered on-pulse durations. Never empty, every pulse > 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pulses: Vec<Duration>,
}

impl Pattern {
    /// Build a pattern from millisecond durations.
    /// Returns None if the sequence is empty or contains a zero-length pulse.
    pub fn from_millis(durations: &[u64]) -> Option<Self> {
        if durations.is_empty() || durations.contains(&0) {
            return None;
        }
        Some(Self {
            pulses: durations.iter().map(|&ms| Duration::from_millis(ms)).collect(),
        })
    }

    pub fn pulses(&self) -> &[Duration] {
        &self.pulses
    }

    /// Total time the motor is engaged.
    pub fn engaged(&self) -> Duration {
        self.pulses.iter().sum()
    }

    /// Wall time for the whole pattern with `gap` between consecutive pulses.
    pub fn span(&self, gap: Duration) -> Duration {
        let gaps = (self.pulses.len() - 1) as u32;
        self.engaged() + gap * gaps
    }
}

/// Normalize a raw action key: trim whitespace, lowercase.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// The fixed action alphabet, built once at startup.
#[derive(Debug, Clone)]
pub struct ActionCatalog {
    patterns: BTreeMap<String, Pattern>,
}

impl ActionCatalog {
    /// Build from the configured table. Invalid entries are dropped with a warning.
    pub fn from_table(table: &BTreeMap<String, Vec<u64>>) -> Self {
        let mut patterns = BTreeMap::new();
        for (raw, durations) in table {
            let key = normalize_key(raw);
            if key.is_empty() {
                log::warn!("Ignoring pattern with empty action key");
                continue;
            }
            match Pattern::from_millis(durations) {
                Some(p) => {
                    patterns.insert(key, p);
                }
                None => log::warn!("Ignoring invalid pattern for '{key}': {durations:?}"),
            }
        }
        Self { patterns }
    }

    pub fn get(&self, key: &str) -> Option<&Pattern> {
        self.patterns.get(&normalize_key(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for ActionCatalog {
    fn default() -> Self {
        Self::from_table(&crate::config::default_patterns())
    }
}
