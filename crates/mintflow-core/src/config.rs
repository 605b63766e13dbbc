//! Polling configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Polling monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between polls, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Attempt budget before the monitor reports a soft timeout.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Whether transient fetch errors (rate limits, network faults)
    /// count toward the attempt budget.
    #[serde(default = "default_count_transient")]
    pub count_transient: bool,
}

fn default_interval_ms() -> u64 {
    3000
}

fn default_max_attempts() -> u32 {
    20
}

fn default_count_transient() -> bool {
    true
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: default_max_attempts(),
            count_transient: default_count_transient(),
        }
    }
}

impl PollConfig {
    /// The poll interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PollConfig::default();
        assert_eq!(config.interval(), Duration::from_secs(3));
        assert_eq!(config.max_attempts, 20);
        assert!(config.count_transient);
    }
}
