//! Defines shared data structures for the Bluetooth module.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::bluetooth::profile::DeviceFamily;
use crate::utils::{format_address, format_local_time};

/// Raw device address as reported by the gateway (little-endian hex string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address in the usual `AA:BB:CC:DD:EE:FF` form
    pub fn display_address(&self) -> String {
        format_address(&self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// BLE address type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressType {
    Public,
    Random,
}

/// Scan type requested from the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Active,
    Passive,
}

/// Gateway timestamp: whole seconds plus microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timestamp {
    pub secs: i64,
    pub micros: u32,
}

impl Timestamp {
    pub fn new(secs: i64, micros: u32) -> Self {
        Self { secs, micros }
    }

    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self {
            secs: now.timestamp(),
            micros: now.timestamp_subsec_micros(),
        }
    }

    pub fn to_local_string(&self) -> String {
        format_local_time(self.secs, self.micros)
    }
}

/// Connection parameters sent with every connect request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Minimum connection interval (x1.25 ms)
    pub interval_min: u16,
    /// Maximum connection interval (x1.25 ms)
    pub interval_max: u16,
    /// Slave latency
    pub latency: u16,
    /// Supervision timeout (x10 ms)
    pub timeout: u16,
}

/// Last advertisement seen for a device during the current scan
#[derive(Debug, Clone, PartialEq)]
pub struct AdvertisedDevice {
    pub id: DeviceId,
    pub address_type: AddressType,
    /// Advertising packet type
    pub event_type: u8,
    /// Signal strength in dBm
    pub rssi: i16,
    /// Advertised name, empty when the device did not send one
    pub name: String,
    pub timestamp: Timestamp,
}

/// A device the gateway holds a connection to
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedDevice {
    pub id: DeviceId,
    pub address_type: AddressType,
    /// Family whose notification routine handles this device, once configured
    pub handler: Option<DeviceFamily>,
}

impl ConnectedDevice {
    pub fn new(id: DeviceId, address_type: AddressType) -> Self {
        Self {
            id,
            address_type,
            handler: None,
        }
    }
}

/// One decoded value ready to be logged or written to the data file
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub timestamp: Timestamp,
    pub device: DeviceId,
    pub handle: u16,
    /// Distinguishes quantities sharing one characteristic
    pub channel: u8,
    pub value: f64,
}

/// Outcome of presenting the discovered devices for selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Connect to these devices, in this order
    Connect(Vec<DeviceId>),
    Rescan,
    Exit,
}

/// Orchestrator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Scanning,
    Selecting,
    Connecting,
    Resolving,
    Configuring,
    Subscribed,
    ShuttingDown,
}
