//! Fetch configuration shared by stores and servers.

use std::time::Duration;

use serde::Deserialize;

/// Controls the blocking behavior of `JobStore::fetch`.
///
/// A store re-reads its configuration before every poll attempt, so changes
/// made while processors are running take effect on their next wake
/// (last-writer-wins, not a per-call override).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FetchConfig {
    /// Whether `fetch` blocks until a job becomes due.
    #[serde(default = "default_wait")]
    pub wait: bool,

    /// How long `fetch` sleeps between poll attempts while waiting.
    /// This is a coarse sleep, not a precise timer.
    #[serde(default = "default_wait_delay", with = "humantime_serde")]
    pub wait_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            wait: default_wait(),
            wait_delay: default_wait_delay(),
        }
    }
}

fn default_wait() -> bool {
    true
}

fn default_wait_delay() -> Duration {
    Duration::from_millis(500)
}

/// A partial update merged into a [`FetchConfig`].
///
/// Fields left as `None` keep their current value.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default)]
    pub wait: Option<bool>,

    #[serde(default, with = "humantime_serde")]
    pub wait_delay: Option<Duration>,
}

impl ConfigUpdate {
    /// An empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `wait` flag.
    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = Some(wait);
        self
    }

    /// Set the delay between poll attempts.
    pub fn wait_delay(mut self, delay: Duration) -> Self {
        self.wait_delay = Some(delay);
        self
    }
}

impl FetchConfig {
    /// Merge an update into this configuration.
    pub fn apply(&mut self, update: ConfigUpdate) {
        if let Some(wait) = update.wait {
            self.wait = wait;
        }
        if let Some(wait_delay) = update.wait_delay {
            self.wait_delay = wait_delay;
        }
    }
}

impl From<FetchConfig> for ConfigUpdate {
    fn from(config: FetchConfig) -> Self {
        Self {
            wait: Some(config.wait),
            wait_delay: Some(config.wait_delay),
        }
    }
}
