//! Playback configuration

use crate::error::Result;
use rewind_history::HistoryKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Shortest rewind window honoured, in seconds.
pub const MIN_REWIND_WINDOW_SECS: u32 = 10;

/// Playback settings, usually loaded from a TOML file.
///
/// ```toml
/// rate = 60.0
/// rewind_enabled = true
/// rewind_window_secs = 30
/// history = "delta_pair"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Ticks per second at speed 1.0
    #[serde(default = "default_rate")]
    pub rate: f64,
    /// Keep a rewind history
    #[serde(default = "default_true")]
    pub rewind_enabled: bool,
    /// Seconds of history to retain
    #[serde(default = "default_window")]
    pub rewind_window_secs: u32,
    /// History storage strategy
    #[serde(default)]
    pub history: HistoryKind,
    /// Multiplier applied to negative speeds
    #[serde(default = "default_rewind_factor")]
    pub rewind_factor: f64,
}

fn default_rate() -> f64 {
    60.0
}

fn default_true() -> bool {
    true
}

fn default_window() -> u32 {
    MIN_REWIND_WINDOW_SECS
}

fn default_rewind_factor() -> f64 {
    0.25
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            rewind_enabled: true,
            rewind_window_secs: default_window(),
            history: HistoryKind::default(),
            rewind_factor: default_rewind_factor(),
        }
    }
}

impl PlaybackConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Set the tick rate.
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Enable or disable rewind and set the window length.
    pub fn with_rewind(mut self, enabled: bool, window_secs: u32) -> Self {
        self.rewind_enabled = enabled;
        self.rewind_window_secs = window_secs;
        self
    }

    /// Select the history strategy.
    pub fn with_history(mut self, history: HistoryKind) -> Self {
        self.history = history;
        self
    }
}

/// Frames needed to hold `window_secs` of history at `rate`.
pub fn frame_capacity(window_secs: u32, rate: f64) -> usize {
    let secs = window_secs.max(MIN_REWIND_WINDOW_SECS);
    (f64::from(secs) * rate).round() as usize
}
