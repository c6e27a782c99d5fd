//! Gateway capability
//! The BLE gateway is a remote collaborator: every operation is an async request/response,
//! and it pushes events and reports back over a channel attached after the session opens.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::bluetooth::types::{AddressType, ConnectionParams, DeviceId, ScanMode, Timestamp};

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("{operation} rejected by gateway: {detail}")]
    Rejected {
        operation: &'static str,
        detail: String,
    },
    #[error("gateway unreachable: {0}")]
    Unreachable(String),
    #[error("gateway session is not open")]
    NotOpen,
}

impl GatewayError {
    pub fn rejected(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoginInfo {
    /// Gateways available to this account
    pub gateways: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub device: DeviceId,
    pub address_type: AddressType,
    pub params: ConnectionParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectTarget {
    Device(DeviceId),
    All,
}

/// One entry of a service or characteristic listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattEntry {
    pub uuid: Uuid,
    /// Start handle for services, value handle for characteristics
    pub handle: u16,
    /// Last handle of a service range
    pub end_handle: u16,
    /// Characteristic properties bit field
    pub properties: Option<u8>,
}

/// One advertising data field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdField {
    pub ad_type: u8,
    pub value: String,
}

/// One item of an advertisement report
#[derive(Debug, Clone, PartialEq)]
pub struct AdvertisementItem {
    pub timestamp: Timestamp,
    pub device: DeviceId,
    pub address_type: AddressType,
    pub event_type: u8,
    pub rssi: i16,
    pub advertisement: Vec<AdField>,
    pub scan_response: Vec<AdField>,
}

/// One item of a notification report
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationItem {
    pub timestamp: Timestamp,
    pub handle: u16,
    pub value: Vec<u8>,
}

/// Session-level events pushed by the gateway
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    Disconnect { device: DeviceId, reason: u8 },
    ScanComplete,
    Other { code: u16 },
}

/// Data-level reports pushed by the gateway
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayReport {
    Advertisement(Vec<AdvertisementItem>),
    Notification {
        device: DeviceId,
        notifications: Vec<NotificationItem>,
    },
    Other { code: u16 },
}

/// Everything the gateway pushes without being asked
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayMessage {
    Event(GatewayEvent),
    Report(GatewayReport),
}

/// Request/response operations of the gateway.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<LoginInfo, GatewayError>;

    async fn logout(&self) -> Result<(), GatewayError>;

    /// Select the gateway subsequent session requests go to
    async fn select(&self, gateway_id: &str) -> Result<(), GatewayError>;

    async fn open(&self) -> Result<(), GatewayError>;

    async fn close(&self) -> Result<(), GatewayError>;

    async fn version(&self) -> Result<String, GatewayError>;

    /// Whether a session is currently open
    fn is_open(&self) -> bool;

    /// Whether the gateway answered recently enough to be worth talking to
    fn is_live(&self) -> bool;

    /// Start a scan for `period_secs`; a period of zero stops scanning.
    async fn scan(&self, mode: ScanMode, period_secs: u32) -> Result<(), GatewayError>;

    async fn show_connected(&self) -> Result<Vec<DeviceId>, GatewayError>;

    async fn connect(&self, request: &ConnectRequest) -> Result<(), GatewayError>;

    async fn disconnect(&self, target: &DisconnectTarget) -> Result<(), GatewayError>;

    /// Primary services of a connected device
    async fn services(&self, device: &DeviceId) -> Result<Vec<GattEntry>, GatewayError>;

    /// Characteristics within a service handle range
    async fn characteristics(
        &self,
        device: &DeviceId,
        start_handle: u16,
        end_handle: u16,
    ) -> Result<Vec<GattEntry>, GatewayError>;

    async fn write(&self, device: &DeviceId, handle: u16, value: &[u8]) -> Result<(), GatewayError>;

    async fn subscribe(&self, device: &DeviceId, handle: u16, notify: bool) -> Result<(), GatewayError>;

    /// Route events and reports into `sender` from now on
    async fn attach(&self, sender: mpsc::Sender<GatewayMessage>) -> Result<(), GatewayError>;
}
