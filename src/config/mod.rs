pub mod sensor_config;
pub mod session_config;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::sensor_config::{OutputConfig, SensorTagConfig};
use crate::config::session_config::{GatewayConfig, ScanConfig, SelectionConfig, ShutdownConfig};
use crate::core::bluetooth::gateway::Credentials;
use crate::core::bluetooth::manager::SessionSettings;
use crate::core::bluetooth::profile::SensorSettings;
use crate::utils::ensure_directory_exists;

pub const CONFIG_FILE_NAME: &str = "gateway_sensor_bridge.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub scan: ScanConfig,
    pub output: OutputConfig,
    pub shutdown: ShutdownConfig,
    pub sensortag: SensorTagConfig,
    pub selection: SelectionConfig,
}

impl AppConfig {
    /// Loads the config from `path`, falling back to defaults when the file does not exist.
    pub async fn load_config(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file not found at {:?}, using default.", path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", path);
        Ok(config)
    }

    /// Saves the config to `path`, creating its directory if needed.
    pub async fn save_config(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_directory_exists(dir).await?;
        }

        let config_json = match serde_json::to_string_pretty(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(path, config_json).await?;

        info!("Config saved to {:?}.", path);
        Ok(())
    }

    pub fn session_settings(&self, password: String) -> SessionSettings {
        SessionSettings {
            credentials: Credentials {
                user: self.gateway.user.clone(),
                password,
            },
            gateway_id: self.gateway.gateway_id.clone(),
            scan_mode: self.scan.mode,
            scan_period_secs: self.scan.period_secs,
            version_timeout: Duration::from_millis(self.gateway.version_timeout_ms),
            sensors: SensorSettings {
                sensortag: self.sensortag.sensors.clone(),
            },
        }
    }

    pub fn shutdown_retry_delay(&self) -> Duration {
        Duration::from_millis(self.shutdown.retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::profile::Sensor;
    use crate::core::bluetooth::types::ScanMode;

    #[tokio::test]
    async fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_config(&dir.path().join("absent.json")).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.shutdown.retries, 3);
        assert_eq!(config.gateway.version_timeout_ms, 5000);
    }

    #[tokio::test]
    async fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "scan": { "mode": "passive" }, "sensortag": { "sensors": ["barometer", "optical"] } }"#,
        )
        .unwrap();

        let config = AppConfig::load_config(&path).await.unwrap();
        assert_eq!(config.scan.mode, ScanMode::Passive);
        assert_eq!(config.scan.period_secs, 5);
        assert_eq!(config.sensortag.sensors, vec![Sensor::Barometer, Sensor::Optical]);
        assert_eq!(config.selection.max_rescans, 3);
    }

    #[tokio::test]
    async fn saved_config_has_no_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut config = AppConfig::default();
        config.gateway.user = "operator".to_string();

        config.save_config(&path).await.unwrap();
        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("operator"));
        assert!(!saved.contains("password"));

        let settings = AppConfig::load_config(&path)
            .await
            .unwrap()
            .session_settings("hunter2".to_string());
        assert_eq!(settings.credentials.user, "operator");
        assert_eq!(settings.credentials.password, "hunter2");
        assert_eq!(settings.version_timeout, Duration::from_secs(5));
    }
}
