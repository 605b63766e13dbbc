//! Settlement configuration.

use serde::{Deserialize, Serialize};

use mintflow_core::PollConfig;

/// Configuration for the claim and purchase coordinators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Confirmation attempts against the backend before reporting an
    /// unconfirmed (optimistic) settlement.
    #[serde(default = "default_confirm_attempts")]
    pub confirm_attempts: u32,

    /// Delay between confirmation attempts, in milliseconds.
    #[serde(default = "default_confirm_delay_ms")]
    pub confirm_delay_ms: u64,

    /// Ledger address credit purchases pay into.
    #[serde(default)]
    pub purchase_destination: String,
}

fn default_confirm_attempts() -> u32 {
    8
}

fn default_confirm_delay_ms() -> u64 {
    3_000
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            confirm_attempts: default_confirm_attempts(),
            confirm_delay_ms: default_confirm_delay_ms(),
            purchase_destination: String::new(),
        }
    }
}

impl SettlementConfig {
    /// Polling configuration for the confirmation loop. Transient
    /// errors do not consume confirmation attempts.
    pub fn confirm_poll(&self) -> PollConfig {
        PollConfig {
            interval_ms: self.confirm_delay_ms,
            max_attempts: self.confirm_attempts,
            count_transient: false,
        }
    }
}
