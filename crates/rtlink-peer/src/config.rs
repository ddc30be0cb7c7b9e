use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::convert::DEFAULT_DISPLAY_SCALE;
use crate::error::{PeerError, Result};

/// Minimum interval between two command writes.
pub const DEFAULT_PACING_DELAY: Duration = Duration::from_millis(100);
/// Readiness wait before the receiver re-checks for shutdown.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);
/// Shortest readiness wait the receiver uses; shorter values are raised to it.
pub const MIN_POLL_TIMEOUT: Duration = Duration::from_millis(1);
/// How long a publisher waits for the consumer before overwriting.
pub const DEFAULT_SLOT_WAIT: Duration = Duration::from_millis(10);

/// Link engine behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    /// Held after every successful command write, with the writer locked.
    pub pacing_delay: Duration,
    /// Readiness wait timeout. `None` blocks until data arrives, which delays
    /// shutdown until the next inbound byte.
    pub poll_timeout: Option<Duration>,
    /// Consumer lag tolerated before an undrained array is overwritten.
    pub slot_wait: Duration,
    /// Display gain applied to normalized voltages.
    pub display_scale: i32,
    /// Put tty devices into raw mode on open.
    pub raw_mode: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            pacing_delay: DEFAULT_PACING_DELAY,
            poll_timeout: Some(DEFAULT_POLL_TIMEOUT),
            slot_wait: DEFAULT_SLOT_WAIT,
            display_scale: DEFAULT_DISPLAY_SCALE,
            raw_mode: true,
        }
    }
}

impl LinkConfig {
    pub fn with_pacing_delay(mut self, delay: Duration) -> Self {
        self.pacing_delay = delay;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.poll_timeout = timeout.map(|t| t.max(MIN_POLL_TIMEOUT));
        self
    }

    pub fn with_slot_wait(mut self, wait: Duration) -> Self {
        self.slot_wait = wait;
        self
    }

    pub fn with_display_scale(mut self, scale: i32) -> Self {
        self.display_scale = scale;
        self
    }

    /// Parse a JSON config. Missing keys keep their defaults.
    ///
    /// ```json
    /// { "pacing_delay_ms": 100, "poll_timeout_ms": 100, "slot_wait_ms": 10,
    ///   "display_scale": 1004, "raw_mode": true }
    /// ```
    ///
    /// `"poll_timeout_ms": null` selects an unbounded wait.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(json)?;
        Ok(file.into_config())
    }

    /// Load a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PeerError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    pacing_delay_ms: Option<u64>,
    #[serde(default = "default_poll_timeout_ms")]
    poll_timeout_ms: Option<u64>,
    slot_wait_ms: Option<u64>,
    display_scale: Option<i32>,
    raw_mode: Option<bool>,
}

fn default_poll_timeout_ms() -> Option<u64> {
    Some(DEFAULT_POLL_TIMEOUT.as_millis() as u64)
}

impl ConfigFile {
    fn into_config(self) -> LinkConfig {
        let defaults = LinkConfig::default();
        LinkConfig {
            pacing_delay: self
                .pacing_delay_ms
                .map_or(defaults.pacing_delay, Duration::from_millis),
            poll_timeout: self
                .poll_timeout_ms
                .map(|ms| Duration::from_millis(ms).max(MIN_POLL_TIMEOUT)),
            slot_wait: self
                .slot_wait_ms
                .map_or(defaults.slot_wait, Duration::from_millis),
            display_scale: self.display_scale.unwrap_or(defaults.display_scale),
            raw_mode: self.raw_mode.unwrap_or(defaults.raw_mode),
        }
    }
}
