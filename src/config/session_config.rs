use serde::{Deserialize, Serialize};

use crate::core::bluetooth::constants::{
    DEFAULT_SCAN_PERIOD_SECS, SHUTDOWN_RETRIES, SHUTDOWN_RETRY_DELAY_MS, VERSION_TIMEOUT_MS,
};
use crate::core::bluetooth::types::ScanMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Account name used at login. The password is never stored.
    pub user: String,

    /// Gateway to open a session on; the first one offered at login when unset
    pub gateway_id: Option<String>,

    /// How long to wait for the version check before giving up on the gateway
    pub version_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            gateway_id: None,
            version_timeout_ms: VERSION_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub mode: ScanMode,

    /// Length of one scan cycle in seconds
    pub period_secs: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::Active,
            period_secs: DEFAULT_SCAN_PERIOD_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Extra stop/disconnect attempts after the first one fails
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            retries: SHUTDOWN_RETRIES,
            retry_delay_ms: SHUTDOWN_RETRY_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Empty scans in a row before the automatic selector gives up
    pub max_rescans: u32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { max_rescans: 3 }
    }
}
