use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::bluetooth::profile::{Sensor, SensorSettings};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorTagConfig {
    /// Sensors switched on for every SensorTag
    pub sensors: Vec<Sensor>,
}

impl Default for SensorTagConfig {
    fn default() -> Self {
        Self {
            sensors: SensorSettings::default().sensortag,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Data file for telemetry records; readings are only logged when unset
    pub file: Option<PathBuf>,
}
