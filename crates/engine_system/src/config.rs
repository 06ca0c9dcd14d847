//! Run loop configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the continuous run loop.
///
/// Loaded from JSON by binaries; every field may be omitted.
///
/// ```json
/// { "tick_rate": 60.0, "max_ticks": 600 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Target updates per second. `0` runs updates back to back.
    pub tick_rate: f64,
    /// Maximum number of updates to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 0.0,
            max_ticks: 0,
        }
    }
}

impl TickConfig {
    /// Parse a config from a JSON document.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// The time budget of one update, or `None` when unpaced.
    ///
    /// Rates that are not positive, or so small that the budget overflows a
    /// [`Duration`], are treated as unpaced.
    #[must_use]
    pub fn tick_duration(&self) -> Option<Duration> {
        if self.tick_rate > 0.0 {
            Duration::try_from_secs_f64(1.0 / self.tick_rate).ok()
        } else {
            None
        }
    }
}
