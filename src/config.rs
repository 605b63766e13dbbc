//! Application configuration loaded from TOML.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use mintflow_core::{PollConfig, SubmitLimits};
use mintflow_settlement::SettlementConfig;

/// External signer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Shell command invoked to sign and submit transactions. Receives
    /// the transaction spec as JSON on stdin and must print a
    /// submission result as JSON on stdout.
    #[serde(default = "default_signer_command")]
    pub signer_command: String,

    /// Seconds to wait for the signer before giving up.
    #[serde(default = "default_signer_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_signer_command() -> String {
    "mintflow-signer".to_string()
}

fn default_signer_timeout_secs() -> u64 {
    120
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            signer_command: default_signer_command(),
            timeout_secs: default_signer_timeout_secs(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend base URL.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Bearer token for backend requests.
    #[serde(default)]
    pub auth_token: String,

    /// Wallet address receiving claims.
    #[serde(default)]
    pub wallet_address: String,

    /// Task status polling.
    #[serde(default)]
    pub polling: PollConfig,

    /// Payload validation ceilings.
    #[serde(default)]
    pub limits: SubmitLimits,

    /// Claim and purchase coordination.
    #[serde(default)]
    pub settlement: SettlementConfig,

    /// External signer.
    #[serde(default)]
    pub wallet: WalletConfig,
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8600".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            auth_token: String::new(),
            wallet_address: String::new(),
            polling: PollConfig::default(),
            limits: SubmitLimits::default(),
            settlement: SettlementConfig::default(),
            wallet: WalletConfig::default(),
        }
    }
}

/// The default config location, `~/.mintflow/config.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".mintflow").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

impl AppConfig {
    /// Load configuration. An explicitly given path must exist; the
    /// default path falls back to built-in defaults when absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::from_file(&path)
                } else {
                    debug!("No config at {}; using defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }
}
