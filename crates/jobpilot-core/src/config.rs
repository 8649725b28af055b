//! Configuration for the jobpilot client
//!
//! Settings load from a TOML file (`~/.jobpilot/config.toml` by default);
//! a missing file yields the built-in defaults. Cadences and retry bounds
//! are configurable mainly so operators can slow the pollers down against
//! rate-limited deployments; the defaults are the supported values.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::Result;

/// Top-level jobpilot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PilotConfig {
    /// Remote API endpoint settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Polling cadences
    #[serde(default)]
    pub cadence: CadenceConfig,

    /// Retry policy for polling calls
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Remote API endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the delivery service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Polling cadences, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceConfig {
    /// Credential image + login status poll interval
    #[serde(default = "default_credential_poll_ms")]
    pub credential_poll_ms: u64,

    /// Quota watchdog interval while the job runs
    #[serde(default = "default_watchdog_ms")]
    pub watchdog_ms: u64,

    /// Background status reconciliation interval
    #[serde(default = "default_reconcile_ms")]
    pub reconcile_ms: u64,

    /// Delay before the confirmatory status poll after a stop
    #[serde(default = "default_stop_confirm_ms")]
    pub stop_confirm_ms: u64,
}

impl CadenceConfig {
    pub fn credential_poll(&self) -> Duration {
        Duration::from_millis(self.credential_poll_ms)
    }

    pub fn watchdog(&self) -> Duration {
        Duration::from_millis(self.watchdog_ms)
    }

    pub fn reconcile(&self) -> Duration {
        Duration::from_millis(self.reconcile_ms)
    }

    pub fn stop_confirm(&self) -> Duration {
        Duration::from_millis(self.stop_confirm_ms)
    }
}

/// Retry policy for polling calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempt cap per call
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

// Default value providers
fn default_base_url() -> String {
    "http://127.0.0.1:8300".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_credential_poll_ms() -> u64 {
    2_000
}

fn default_watchdog_ms() -> u64 {
    10_000
}

fn default_reconcile_ms() -> u64 {
    30_000
}

fn default_stop_confirm_ms() -> u64 {
    2_000
}

fn default_max_attempts() -> u32 {
    crate::retry::DEFAULT_MAX_ATTEMPTS
}

impl PilotConfig {
    /// Load configuration from the given TOML file or use defaults
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            Ok(toml::from_str(&content).map_err(|e| {
                crate::PilotError::Config(format!("Failed to parse config file: {}", e))
            })?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            cadence: CadenceConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            credential_poll_ms: default_credential_poll_ms(),
            watchdog_ms: default_watchdog_ms(),
            reconcile_ms: default_reconcile_ms(),
            stop_confirm_ms: default_stop_confirm_ms(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}
