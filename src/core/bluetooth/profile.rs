//! Device profiles
//! Static descriptors for every supported sensor family: how to recognise it, how to connect,
//! which GATT layout it exposes, how to configure it and how to decode its notifications.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::bluetooth::commands::SensorCommand;
use crate::core::bluetooth::constants::*;
use crate::core::bluetooth::gateway::NotificationItem;
use crate::core::bluetooth::handles::GattHandleTable;
use crate::core::bluetooth::types::ConnectionParams;
use crate::core::codec::{self, CodecError, Measurement, Quantity, SensorModel};

/// Individually switchable sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensor {
    IrTemperature,
    Humidity,
    Barometer,
    Optical,
    Movement,
    Temperature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacteristicRole {
    /// Notifying data characteristic; decoded values get sub-channels from `channel_base` up
    Data { model: SensorModel, channel_base: u8 },
    /// Configuration characteristic and the value that switches the sensor on
    Config { enable: &'static [u8] },
    Period,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicDescriptor {
    pub uuid: Uuid,
    pub role: CharacteristicRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub uuid: Uuid,
    pub sensor: Sensor,
    pub characteristics: &'static [CharacteristicDescriptor],
}

#[derive(Debug, PartialEq, Eq)]
pub struct DeviceProfile {
    pub family: DeviceFamily,
    /// Advertised name that identifies the family
    pub advertised_name: &'static str,
    pub connection: ConnectionParams,
    pub services: &'static [ServiceDescriptor],
}

impl DeviceProfile {
    /// Every declared characteristic, in declaration order
    pub fn characteristics(&self) -> impl Iterator<Item = &'static CharacteristicDescriptor> + '_ {
        self.services.iter().flat_map(|s| s.characteristics.iter())
    }
}

const fn sensortag_service(
    sensor: Sensor,
    service: Uuid,
    characteristics: &'static [CharacteristicDescriptor],
) -> ServiceDescriptor {
    ServiceDescriptor {
        uuid: service,
        sensor,
        characteristics,
    }
}

pub static SENSORTAG_PROFILE: DeviceProfile = DeviceProfile {
    family: DeviceFamily::SensorTag,
    advertised_name: SENSORTAG_NAME,
    connection: ConnectionParams {
        interval_min: 16,
        interval_max: 200,
        latency: 0,
        timeout: 200,
    },
    services: &[
        sensortag_service(
            Sensor::IrTemperature,
            UUID_SENSORTAG_IR_SERVICE,
            &[
                CharacteristicDescriptor {
                    uuid: UUID_SENSORTAG_IR_DATA,
                    role: CharacteristicRole::Data { model: SensorModel::Tmp007, channel_base: 0 },
                },
                CharacteristicDescriptor {
                    uuid: UUID_SENSORTAG_IR_CONFIG,
                    role: CharacteristicRole::Config { enable: SENSORTAG_ENABLE },
                },
                CharacteristicDescriptor { uuid: UUID_SENSORTAG_IR_PERIOD, role: CharacteristicRole::Period },
            ],
        ),
        sensortag_service(
            Sensor::Humidity,
            UUID_SENSORTAG_HUMIDITY_SERVICE,
            &[
                CharacteristicDescriptor {
                    uuid: UUID_SENSORTAG_HUMIDITY_DATA,
                    role: CharacteristicRole::Data { model: SensorModel::Hdc1000, channel_base: 0 },
                },
                CharacteristicDescriptor {
                    uuid: UUID_SENSORTAG_HUMIDITY_CONFIG,
                    role: CharacteristicRole::Config { enable: SENSORTAG_ENABLE },
                },
                CharacteristicDescriptor {
                    uuid: UUID_SENSORTAG_HUMIDITY_PERIOD,
                    role: CharacteristicRole::Period,
                },
            ],
        ),
        sensortag_service(
            Sensor::Barometer,
            UUID_SENSORTAG_BAROMETER_SERVICE,
            &[
                CharacteristicDescriptor {
                    uuid: UUID_SENSORTAG_BAROMETER_DATA,
                    role: CharacteristicRole::Data { model: SensorModel::Bmp280, channel_base: 0 },
                },
                CharacteristicDescriptor {
                    uuid: UUID_SENSORTAG_BAROMETER_CONFIG,
                    role: CharacteristicRole::Config { enable: SENSORTAG_ENABLE },
                },
                CharacteristicDescriptor {
                    uuid: UUID_SENSORTAG_BAROMETER_PERIOD,
                    role: CharacteristicRole::Period,
                },
            ],
        ),
        sensortag_service(
            Sensor::Optical,
            UUID_SENSORTAG_OPTICAL_SERVICE,
            &[
                CharacteristicDescriptor {
                    uuid: UUID_SENSORTAG_OPTICAL_DATA,
                    role: CharacteristicRole::Data { model: SensorModel::Opt3001, channel_base: 0 },
                },
                CharacteristicDescriptor {
                    uuid: UUID_SENSORTAG_OPTICAL_CONFIG,
                    role: CharacteristicRole::Config { enable: SENSORTAG_ENABLE },
                },
                CharacteristicDescriptor {
                    uuid: UUID_SENSORTAG_OPTICAL_PERIOD,
                    role: CharacteristicRole::Period,
                },
            ],
        ),
        sensortag_service(
            Sensor::Movement,
            UUID_SENSORTAG_MOVEMENT_SERVICE,
            &[
                CharacteristicDescriptor {
                    uuid: UUID_SENSORTAG_MOVEMENT_DATA,
                    role: CharacteristicRole::Data { model: SensorModel::Mpu9250, channel_base: 0 },
                },
                CharacteristicDescriptor {
                    uuid: UUID_SENSORTAG_MOVEMENT_CONFIG,
                    role: CharacteristicRole::Config { enable: SENSORTAG_MOVEMENT_ENABLE },
                },
                CharacteristicDescriptor {
                    uuid: UUID_SENSORTAG_MOVEMENT_PERIOD,
                    role: CharacteristicRole::Period,
                },
            ],
        ),
    ],
};

pub static HUMIGADGET_PROFILE: DeviceProfile = DeviceProfile {
    family: DeviceFamily::Humigadget,
    advertised_name: HUMIGADGET_NAME,
    connection: ConnectionParams {
        interval_min: 16,
        interval_max: 200,
        latency: 4,
        timeout: 500,
    },
    services: &[
        ServiceDescriptor {
            uuid: UUID_HUMIGADGET_HUMIDITY_SERVICE,
            sensor: Sensor::Humidity,
            characteristics: &[CharacteristicDescriptor {
                uuid: UUID_HUMIGADGET_HUMIDITY_DATA,
                role: CharacteristicRole::Data { model: SensorModel::Float32, channel_base: 1 },
            }],
        },
        ServiceDescriptor {
            uuid: UUID_HUMIGADGET_TEMPERATURE_SERVICE,
            sensor: Sensor::Temperature,
            characteristics: &[CharacteristicDescriptor {
                uuid: UUID_HUMIGADGET_TEMPERATURE_DATA,
                role: CharacteristicRole::Data { model: SensorModel::Float32, channel_base: 0 },
            }],
        },
    ],
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("characteristic {0} has no resolved handle")]
    MissingHandle(Uuid),
}

/// A decoded value tied to its sub-channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelReading {
    pub channel: u8,
    pub measurement: Measurement,
}

/// Per-family sensor settings chosen by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorSettings {
    /// SensorTag sensors to switch on
    pub sensortag: Vec<Sensor>,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            sensortag: vec![Sensor::Humidity],
        }
    }
}

/// Behaviour a device family plugs into the orchestrator
pub trait FamilyBehavior: Send + Sync {
    fn profile(&self) -> &'static DeviceProfile;

    /// Whether an advertised name belongs to this family
    fn matches(&self, advertised_name: &str) -> bool {
        advertised_name == self.profile().advertised_name
    }

    /// Ordered writes/subscriptions that instrument one device.
    fn configuration(
        &self,
        table: &GattHandleTable,
        settings: &SensorSettings,
    ) -> Result<Vec<SensorCommand>, ProfileError>;

    /// Decodes a notification item. Items from characteristics this family does not
    /// read yield no readings.
    fn decode(
        &self,
        table: &GattHandleTable,
        item: &NotificationItem,
    ) -> Result<Vec<ChannelReading>, CodecError> {
        decode_by_handle(self.profile(), table, item)
    }
}

fn decode_by_handle(
    profile: &DeviceProfile,
    table: &GattHandleTable,
    item: &NotificationItem,
) -> Result<Vec<ChannelReading>, CodecError> {
    let data = profile.characteristics().find_map(|c| match c.role {
        CharacteristicRole::Data { model, channel_base } if table.handle(c.uuid) == Some(item.handle) => {
            Some((model, channel_base))
        }
        _ => None,
    });
    let Some((model, channel_base)) = data else {
        return Ok(Vec::new());
    };

    let readings = codec::decode(model, &item.value)?
        .into_iter()
        .enumerate()
        .map(|(index, measurement)| ChannelReading {
            channel: channel_base + index as u8,
            measurement,
        })
        .collect();
    Ok(readings)
}

fn required_handle(table: &GattHandleTable, uuid: Uuid) -> Result<u16, ProfileError> {
    table.handle(uuid).ok_or(ProfileError::MissingHandle(uuid))
}

pub struct SensorTagFamily;

impl FamilyBehavior for SensorTagFamily {
    fn profile(&self) -> &'static DeviceProfile {
        &SENSORTAG_PROFILE
    }

    fn configuration(
        &self,
        table: &GattHandleTable,
        settings: &SensorSettings,
    ) -> Result<Vec<SensorCommand>, ProfileError> {
        let mut commands = Vec::new();
        for service in self.profile().services {
            if !settings.sensortag.contains(&service.sensor) {
                continue;
            }
            // switch the sensor on before asking for its data
            for c in service.characteristics {
                if let CharacteristicRole::Config { enable } = c.role {
                    commands.push(SensorCommand::Write {
                        handle: required_handle(table, c.uuid)?,
                        value: enable.to_vec(),
                    });
                }
            }
            for c in service.characteristics {
                if let CharacteristicRole::Data { .. } = c.role {
                    commands.push(SensorCommand::Subscribe {
                        handle: required_handle(table, c.uuid)?,
                    });
                }
            }
        }
        Ok(commands)
    }
}

pub struct HumigadgetFamily;

impl FamilyBehavior for HumigadgetFamily {
    fn profile(&self) -> &'static DeviceProfile {
        &HUMIGADGET_PROFILE
    }

    fn configuration(
        &self,
        table: &GattHandleTable,
        _settings: &SensorSettings,
    ) -> Result<Vec<SensorCommand>, ProfileError> {
        self.profile()
            .characteristics()
            .filter(|c| matches!(c.role, CharacteristicRole::Data { .. }))
            .map(|c| Ok(SensorCommand::Subscribe { handle: required_handle(table, c.uuid)? }))
            .collect()
    }

    /// Both characteristics carry a bare float; the channel says which quantity it is.
    fn decode(
        &self,
        table: &GattHandleTable,
        item: &NotificationItem,
    ) -> Result<Vec<ChannelReading>, CodecError> {
        let mut readings = decode_by_handle(self.profile(), table, item)?;
        for reading in &mut readings {
            reading.measurement.quantity = match reading.channel {
                0 => Quantity::Temperature,
                _ => Quantity::RelativeHumidity,
            };
        }
        Ok(readings)
    }
}

/// The closed set of supported device families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceFamily {
    SensorTag,
    Humigadget,
}

impl DeviceFamily {
    /// All families, in the order their pipelines are started
    pub const ALL: [DeviceFamily; 2] = [DeviceFamily::SensorTag, DeviceFamily::Humigadget];

    pub fn behavior(self) -> &'static dyn FamilyBehavior {
        match self {
            Self::SensorTag => &SensorTagFamily,
            Self::Humigadget => &HumigadgetFamily,
        }
    }

    pub fn profile(self) -> &'static DeviceProfile {
        self.behavior().profile()
    }

    pub fn matches(self, advertised_name: &str) -> bool {
        self.behavior().matches(advertised_name)
    }

    /// Families whose predicate accepts `advertised_name`; may be more than one
    pub fn matching(advertised_name: &str) -> Vec<DeviceFamily> {
        Self::ALL
            .into_iter()
            .filter(|f| f.matches(advertised_name))
            .collect()
    }
}
