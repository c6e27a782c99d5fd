//! Constants used throughout the application
//! This module contains the advertised names, GATT UUIDs, connection parameters and
//! timing values for the supported sensor families.

use uuid::Uuid;

/// Advertised name of the TI CC2650 SensorTag
pub const SENSORTAG_NAME: &str = "CC2650 SensorTag";

/// Advertised name of the Sensirion SHT31 Smart Humigadget
pub const HUMIGADGET_NAME: &str = "Smart Humigadget";

/// TI SensorTag services and characteristics (base F000xxxx-0451-4000-B000-000000000000)
pub const UUID_SENSORTAG_IR_SERVICE: Uuid = Uuid::from_u128(0xf000aa00_0451_4000_b000_000000000000);
pub const UUID_SENSORTAG_IR_DATA: Uuid = Uuid::from_u128(0xf000aa01_0451_4000_b000_000000000000);
pub const UUID_SENSORTAG_IR_CONFIG: Uuid = Uuid::from_u128(0xf000aa02_0451_4000_b000_000000000000);
pub const UUID_SENSORTAG_IR_PERIOD: Uuid = Uuid::from_u128(0xf000aa03_0451_4000_b000_000000000000);

pub const UUID_SENSORTAG_HUMIDITY_SERVICE: Uuid = Uuid::from_u128(0xf000aa20_0451_4000_b000_000000000000);
pub const UUID_SENSORTAG_HUMIDITY_DATA: Uuid = Uuid::from_u128(0xf000aa21_0451_4000_b000_000000000000);
pub const UUID_SENSORTAG_HUMIDITY_CONFIG: Uuid = Uuid::from_u128(0xf000aa22_0451_4000_b000_000000000000);
pub const UUID_SENSORTAG_HUMIDITY_PERIOD: Uuid = Uuid::from_u128(0xf000aa23_0451_4000_b000_000000000000);

pub const UUID_SENSORTAG_BAROMETER_SERVICE: Uuid = Uuid::from_u128(0xf000aa40_0451_4000_b000_000000000000);
pub const UUID_SENSORTAG_BAROMETER_DATA: Uuid = Uuid::from_u128(0xf000aa41_0451_4000_b000_000000000000);
pub const UUID_SENSORTAG_BAROMETER_CONFIG: Uuid = Uuid::from_u128(0xf000aa42_0451_4000_b000_000000000000);
pub const UUID_SENSORTAG_BAROMETER_PERIOD: Uuid = Uuid::from_u128(0xf000aa44_0451_4000_b000_000000000000);

pub const UUID_SENSORTAG_OPTICAL_SERVICE: Uuid = Uuid::from_u128(0xf000aa70_0451_4000_b000_000000000000);
pub const UUID_SENSORTAG_OPTICAL_DATA: Uuid = Uuid::from_u128(0xf000aa71_0451_4000_b000_000000000000);
pub const UUID_SENSORTAG_OPTICAL_CONFIG: Uuid = Uuid::from_u128(0xf000aa72_0451_4000_b000_000000000000);
pub const UUID_SENSORTAG_OPTICAL_PERIOD: Uuid = Uuid::from_u128(0xf000aa73_0451_4000_b000_000000000000);

pub const UUID_SENSORTAG_MOVEMENT_SERVICE: Uuid = Uuid::from_u128(0xf000aa80_0451_4000_b000_000000000000);
pub const UUID_SENSORTAG_MOVEMENT_DATA: Uuid = Uuid::from_u128(0xf000aa81_0451_4000_b000_000000000000);
pub const UUID_SENSORTAG_MOVEMENT_CONFIG: Uuid = Uuid::from_u128(0xf000aa82_0451_4000_b000_000000000000);
pub const UUID_SENSORTAG_MOVEMENT_PERIOD: Uuid = Uuid::from_u128(0xf000aa83_0451_4000_b000_000000000000);

/// Sensirion Humigadget services and characteristics
pub const UUID_HUMIGADGET_HUMIDITY_SERVICE: Uuid = Uuid::from_u128(0x00001234_b38d_4985_720e_0f993a68ee41);
pub const UUID_HUMIGADGET_HUMIDITY_DATA: Uuid = Uuid::from_u128(0x00001235_b38d_4985_720e_0f993a68ee41);
pub const UUID_HUMIGADGET_TEMPERATURE_SERVICE: Uuid = Uuid::from_u128(0x00002234_b38d_4985_720e_0f993a68ee41);
pub const UUID_HUMIGADGET_TEMPERATURE_DATA: Uuid = Uuid::from_u128(0x00002235_b38d_4985_720e_0f993a68ee41);

/// Value written to a SensorTag configuration characteristic to switch the sensor on
pub const SENSORTAG_ENABLE: &[u8] = &[0x01];

/// Movement sensor: gyro, accelerometer and magnetometer on, accelerometer range 8G
pub const SENSORTAG_MOVEMENT_ENABLE: &[u8] = &[0x7F, 0x02];

/// AD type of a shortened local name
pub const AD_TYPE_SHORT_NAME: u8 = 0x08;

/// AD type of a complete local name
pub const AD_TYPE_COMPLETE_NAME: u8 = 0x09;

/// Default retry budget for graceful shutdown
pub const SHUTDOWN_RETRIES: u32 = 3;

/// Delay between shutdown retries in milliseconds
pub const SHUTDOWN_RETRY_DELAY_MS: u64 = 100;

/// Timeout for the gateway version check in milliseconds
pub const VERSION_TIMEOUT_MS: u64 = 5000;

/// Default scan duration in seconds
pub const DEFAULT_SCAN_PERIOD_SECS: u32 = 5;

/// Capacity of the gateway event/report channel
pub const GATEWAY_CHANNEL_CAPACITY: usize = 256;
