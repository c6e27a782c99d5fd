//! In-process gateway
//! A virtual fleet of SensorTags and Humigadgets behind the [`Gateway`] capability. GATT tables
//! are laid out from the device profiles, subscribed characteristics push synthetic readings, and
//! most requests can be made to fail on demand.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::constants::AD_TYPE_COMPLETE_NAME;
use crate::core::bluetooth::gateway::{
    AdField, AdvertisementItem, ConnectRequest, Credentials, DisconnectTarget, Gateway, GatewayError,
    GatewayEvent, GatewayMessage, GatewayReport, GattEntry, LoginInfo, NotificationItem,
};
use crate::core::bluetooth::profile::{CharacteristicRole, DeviceFamily};
use crate::core::bluetooth::types::{AddressType, DeviceId, ScanMode, Timestamp};
use crate::core::codec::SensorModel;

const GAP_SERVICE: Uuid = Uuid::from_u128(0x00001800_0000_1000_8000_00805f9b34fb);
const GAP_DEVICE_NAME: Uuid = Uuid::from_u128(0x00002a00_0000_1000_8000_00805f9b34fb);

const PROP_READ: u8 = 0x02;
const PROP_READ_WRITE: u8 = 0x0A;
const PROP_READ_NOTIFY: u8 = 0x12;

const AD_TYPE_FLAGS: u8 = 0x01;
const AD_TYPE_TX_POWER: u8 = 0x0A;

/// Disconnect reason reported when the host ended the connection
const REASON_LOCAL_HOST: u8 = 0x16;

pub const DEFAULT_GATEWAY_ID: &str = "GW-SIM-0001";
const DEFAULT_NOTIFY_INTERVAL: Duration = Duration::from_secs(1);
const FIRMWARE_VERSION: &str = "sim-1.0.0";

/// A virtual peripheral
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub id: DeviceId,
    pub name: String,
    pub family: Option<DeviceFamily>,
    pub address_type: AddressType,
    pub rssi: i16,
    missing_services: Vec<Uuid>,
    reject_connect: bool,
}

impl SimulatedDevice {
    fn of_family(id: &str, family: DeviceFamily) -> Self {
        Self {
            id: DeviceId::new(id),
            name: family.profile().advertised_name.to_string(),
            family: Some(family),
            address_type: AddressType::Public,
            rssi: -60,
            missing_services: Vec::new(),
            reject_connect: false,
        }
    }

    pub fn sensortag(id: &str) -> Self {
        Self::of_family(id, DeviceFamily::SensorTag)
    }

    pub fn humigadget(id: &str) -> Self {
        Self::of_family(id, DeviceFamily::Humigadget)
    }

    /// A device no family recognises
    pub fn unknown(id: &str, name: &str) -> Self {
        Self {
            id: DeviceId::new(id),
            name: name.to_string(),
            family: None,
            address_type: AddressType::Random,
            rssi: -75,
            missing_services: Vec::new(),
            reject_connect: false,
        }
    }

    pub fn without_service(mut self, uuid: Uuid) -> Self {
        self.missing_services.push(uuid);
        self
    }

    pub fn rejecting_connect(mut self) -> Self {
        self.reject_connect = true;
        self
    }

    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = rssi;
        self
    }

    fn advertisement(&self, mode: ScanMode) -> AdvertisementItem {
        let scan_response = match mode {
            ScanMode::Active => vec![AdField {
                ad_type: AD_TYPE_TX_POWER,
                value: "00".to_string(),
            }],
            ScanMode::Passive => Vec::new(),
        };
        AdvertisementItem {
            timestamp: Timestamp::now(),
            device: self.id.clone(),
            address_type: self.address_type,
            event_type: 0,
            rssi: self.rssi,
            advertisement: vec![
                AdField {
                    ad_type: AD_TYPE_FLAGS,
                    value: "06".to_string(),
                },
                AdField {
                    ad_type: AD_TYPE_COMPLETE_NAME,
                    value: self.name.clone(),
                },
            ],
            scan_response,
        }
    }

    fn layout(&self) -> Vec<SimulatedService> {
        gatt_layout(self.family)
            .into_iter()
            .filter(|s| !self.missing_services.contains(&s.entry.uuid))
            .collect()
    }

    fn characteristic(&self, handle: u16) -> Option<SimulatedCharacteristic> {
        self.layout()
            .into_iter()
            .flat_map(|s| s.characteristics)
            .find(|c| c.entry.handle == handle)
    }
}

#[derive(Debug, Clone)]
struct SimulatedCharacteristic {
    entry: GattEntry,
    role: Option<CharacteristicRole>,
}

#[derive(Debug, Clone)]
struct SimulatedService {
    entry: GattEntry,
    characteristics: Vec<SimulatedCharacteristic>,
}

/// Handles are assigned from the profile, so every device of a family shares one layout.
/// Each characteristic takes a declaration, a value and a descriptor handle.
fn gatt_layout(family: Option<DeviceFamily>) -> Vec<SimulatedService> {
    let mut services = vec![SimulatedService {
        entry: GattEntry {
            uuid: GAP_SERVICE,
            handle: 0x0001,
            end_handle: 0x0007,
            properties: None,
        },
        characteristics: vec![SimulatedCharacteristic {
            entry: GattEntry {
                uuid: GAP_DEVICE_NAME,
                handle: 0x0003,
                end_handle: 0x0003,
                properties: Some(PROP_READ),
            },
            role: None,
        }],
    }];

    let Some(family) = family else {
        return services;
    };

    let mut next: u16 = 0x0020;
    for service in family.profile().services {
        let start = next;
        next += 1;
        let mut characteristics = Vec::new();
        for declared in service.characteristics {
            let value = next + 1;
            next += 3;
            let properties = match declared.role {
                CharacteristicRole::Data { .. } => PROP_READ_NOTIFY,
                CharacteristicRole::Config { .. } | CharacteristicRole::Period => PROP_READ_WRITE,
            };
            characteristics.push(SimulatedCharacteristic {
                entry: GattEntry {
                    uuid: declared.uuid,
                    handle: value,
                    end_handle: value,
                    properties: Some(properties),
                },
                role: Some(declared.role),
            });
        }
        services.push(SimulatedService {
            entry: GattEntry {
                uuid: service.uuid,
                handle: start,
                end_handle: next - 1,
                properties: None,
            },
            characteristics,
        });
        next += 4;
    }
    services
}

/// Plausible readings that drift a little with `tick`
pub fn synthetic_payload(model: SensorModel, channel_base: u8, tick: u32) -> Vec<u8> {
    let drift = (tick % 10) as f64 * 0.1;
    match model {
        SensorModel::Hdc1000 => {
            let temperature = ((22.0 + drift + 40.0) / 165.0 * 65536.0) as u16;
            let humidity = ((45.0 + drift) / 100.0 * 65536.0) as u16;
            [temperature.to_le_bytes(), humidity.to_le_bytes()].concat()
        }
        SensorModel::Bmp280 => {
            let temperature = 2300 + tick % 10;
            let pressure = 101_325 + tick % 10;
            let mut payload = temperature.to_le_bytes()[..3].to_vec();
            payload.extend_from_slice(&pressure.to_le_bytes()[..3]);
            payload
        }
        SensorModel::Tmp007 => {
            let object = ((24.0 + drift) * 64.0) as i16;
            let ambient = (23.0 * 64.0) as i16;
            [object.to_le_bytes(), ambient.to_le_bytes()].concat()
        }
        SensorModel::Mpu9250 => {
            let z = 4096 + (tick % 10) as i16;
            [10i16, -12, 3, 0, 0, z, 30, -25, 40]
                .iter()
                .flat_map(|axis| axis.to_le_bytes())
                .collect()
        }
        SensorModel::Opt3001 => {
            let raw: u16 = (2 << 12) | (500 + (tick % 10) as u16);
            raw.to_le_bytes().to_vec()
        }
        SensorModel::Float32 => {
            let value = if channel_base == 0 { 22.5 + drift } else { 45.0 + drift };
            (value as f32).to_le_bytes().to_vec()
        }
    }
}

/// Requests served so far, by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayCounters {
    pub logins: u32,
    pub logouts: u32,
    pub opens: u32,
    pub closes: u32,
    pub versions: u32,
    pub scans: u32,
    pub scan_stops: u32,
    pub show_connected: u32,
    pub connects: u32,
    pub disconnects: u32,
    pub services: u32,
    pub characteristics: u32,
    pub writes: u32,
    pub subscribes: u32,
}

#[derive(Debug, Default)]
struct Failures {
    login: bool,
    version: bool,
    stall_version: bool,
    scan_stop: bool,
    disconnect_all: bool,
    service_discovery: bool,
    writes: bool,
    unreachable: bool,
}

struct Connection {
    device: SimulatedDevice,
    subscriptions: HashMap<u16, CancellationToken>,
}

impl Connection {
    fn drop_subscriptions(&mut self) {
        for (_, token) in self.subscriptions.drain() {
            token.cancel();
        }
    }
}

struct Inner {
    devices: Vec<SimulatedDevice>,
    gateways: Vec<String>,
    selected: Option<String>,
    open: bool,
    connected: HashMap<DeviceId, Connection>,
    sender: Option<mpsc::Sender<GatewayMessage>>,
    scan: Option<CancellationToken>,
    counters: GatewayCounters,
    failures: Failures,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pushes `message` to the attached channel, waiting for room
async fn deliver(inner: &Mutex<Inner>, message: GatewayMessage) -> bool {
    let sender = lock(inner).sender.clone();
    match sender {
        Some(sender) => sender.send(message).await.is_ok(),
        None => true,
    }
}

#[derive(Clone)]
pub struct SimulatedGateway {
    inner: Arc<Mutex<Inner>>,
    notify_interval: Duration,
}

impl SimulatedGateway {
    pub fn new(devices: Vec<SimulatedDevice>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                devices,
                gateways: vec![DEFAULT_GATEWAY_ID.to_string()],
                selected: None,
                open: false,
                connected: HashMap::new(),
                sender: None,
                scan: None,
                counters: GatewayCounters::default(),
                failures: Failures::default(),
            })),
            notify_interval: DEFAULT_NOTIFY_INTERVAL,
        }
    }

    /// `sensortags` SensorTags followed by `humigadgets` Humigadgets
    pub fn fleet(sensortags: u16, humigadgets: u16) -> Self {
        let devices = (0..sensortags)
            .map(|i| SimulatedDevice::sensortag(&fleet_address(0x51, i)))
            .chain((0..humigadgets).map(|i| SimulatedDevice::humigadget(&fleet_address(0x48, i))))
            .collect();
        Self::new(devices)
    }

    pub fn with_gateways(self, gateways: Vec<String>) -> Self {
        lock(&self.inner).gateways = gateways;
        self
    }

    pub fn with_notify_interval(mut self, interval: Duration) -> Self {
        self.notify_interval = interval;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    pub fn counters(&self) -> GatewayCounters {
        self.lock().counters
    }

    pub fn selected_gateway(&self) -> Option<String> {
        self.lock().selected.clone()
    }

    /// Marks `id` connected without a connect request
    pub fn force_connected(&self, id: &DeviceId) {
        let mut inner = self.lock();
        let Some(device) = inner.devices.iter().find(|d| &d.id == id).cloned() else {
            warn!("Simulator has no device {}", id);
            return;
        };
        inner.connected.insert(
            id.clone(),
            Connection {
                device,
                subscriptions: HashMap::new(),
            },
        );
    }

    pub fn connected_ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<_> = self.lock().connected.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of characteristics currently pushing notifications
    pub fn active_subscriptions(&self) -> usize {
        self.lock()
            .connected
            .values()
            .map(|c| c.subscriptions.len())
            .sum()
    }

    /// Drops the link to `id` as if the peripheral went away
    pub fn drop_link(&self, id: &DeviceId) {
        let removed = self.lock().connected.remove(id);
        if let Some(mut connection) = removed {
            connection.drop_subscriptions();
            self.push(GatewayMessage::Event(GatewayEvent::Disconnect {
                device: id.clone(),
                reason: 0x08,
            }));
        }
    }

    /// Injects an arbitrary event or report
    pub fn push(&self, message: GatewayMessage) {
        let sender = self.lock().sender.clone();
        if let Some(sender) = sender {
            if let Err(e) = sender.try_send(message) {
                debug!("Simulator dropped a message: {}", e);
            }
        }
    }

    pub fn fail_login(&self, fail: bool) {
        self.lock().failures.login = fail;
    }

    pub fn fail_version(&self, fail: bool) {
        self.lock().failures.version = fail;
    }

    /// The version query never answers
    pub fn stall_version(&self, stall: bool) {
        self.lock().failures.stall_version = stall;
    }

    pub fn fail_scan_stop(&self, fail: bool) {
        self.lock().failures.scan_stop = fail;
    }

    pub fn fail_disconnect_all(&self, fail: bool) {
        self.lock().failures.disconnect_all = fail;
    }

    pub fn fail_service_discovery(&self, fail: bool) {
        self.lock().failures.service_discovery = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.lock().failures.writes = fail;
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.lock().failures.unreachable = !reachable;
    }

    fn spawn_notifier(
        &self,
        device: DeviceId,
        handle: u16,
        model: SensorModel,
        channel_base: u8,
        token: CancellationToken,
    ) {
        let inner = self.inner.clone();
        let period = self.notify_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            let mut tick = 0u32;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let report = GatewayMessage::Report(GatewayReport::Notification {
                    device: device.clone(),
                    notifications: vec![NotificationItem {
                        timestamp: Timestamp::now(),
                        handle,
                        value: synthetic_payload(model, channel_base, tick),
                    }],
                });
                let delivered = tokio::select! {
                    _ = token.cancelled() => break,
                    delivered = deliver(&inner, report) => delivered,
                };
                if !delivered {
                    break;
                }
                tick = tick.wrapping_add(1);
            }
            debug!("Notifications on {} handle {} stopped", device, handle);
        });
    }
}

/// Raw little-endian address: index in the two low bytes, then the family byte
fn fleet_address(family_byte: u8, index: u16) -> String {
    let [low, high] = index.to_le_bytes();
    format!("{:02x}{:02x}{:02x}00b0a0", low, high, family_byte)
}

#[async_trait]
impl Gateway for SimulatedGateway {
    async fn login(&self, credentials: &Credentials) -> Result<LoginInfo, GatewayError> {
        let mut inner = self.lock();
        inner.counters.logins += 1;
        if inner.failures.login || inner.failures.unreachable {
            return Err(GatewayError::Unreachable("login failed".to_string()));
        }
        info!("Simulated login for {}", credentials.user);
        Ok(LoginInfo {
            gateways: inner.gateways.clone(),
        })
    }

    async fn logout(&self) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        inner.counters.logouts += 1;
        inner.selected = None;
        Ok(())
    }

    async fn select(&self, gateway_id: &str) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        if !inner.gateways.iter().any(|g| g == gateway_id) {
            return Err(GatewayError::rejected("select", format!("unknown gateway {}", gateway_id)));
        }
        inner.selected = Some(gateway_id.to_string());
        Ok(())
    }

    async fn open(&self) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        inner.counters.opens += 1;
        if inner.failures.unreachable {
            return Err(GatewayError::Unreachable("session open timed out".to_string()));
        }
        if inner.selected.is_none() {
            return Err(GatewayError::rejected("open", "no gateway selected"));
        }
        inner.open = true;
        Ok(())
    }

    async fn close(&self) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        inner.counters.closes += 1;
        if !inner.open {
            return Err(GatewayError::NotOpen);
        }
        inner.open = false;
        if let Some(scan) = inner.scan.take() {
            scan.cancel();
        }
        for connection in inner.connected.values_mut() {
            connection.drop_subscriptions();
        }
        inner.connected.clear();
        inner.sender = None;
        Ok(())
    }

    async fn version(&self) -> Result<String, GatewayError> {
        let stall = {
            let mut inner = self.lock();
            inner.counters.versions += 1;
            if !inner.open {
                return Err(GatewayError::NotOpen);
            }
            if inner.failures.version {
                return Err(GatewayError::Unreachable("no version response".to_string()));
            }
            inner.failures.stall_version
        };
        if stall {
            std::future::pending::<()>().await;
        }
        Ok(FIRMWARE_VERSION.to_string())
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn is_live(&self) -> bool {
        let inner = self.lock();
        inner.open && !inner.failures.unreachable
    }

    async fn scan(&self, mode: ScanMode, period_secs: u32) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        if let Some(previous) = inner.scan.take() {
            previous.cancel();
        }
        if period_secs == 0 {
            inner.counters.scan_stops += 1;
            if inner.failures.scan_stop {
                return Err(GatewayError::rejected("scan stop", "busy"));
            }
            return Ok(());
        }

        inner.counters.scans += 1;
        let token = CancellationToken::new();
        inner.scan = Some(token.clone());
        let items: Vec<AdvertisementItem> = inner
            .devices
            .iter()
            .filter(|d| !inner.connected.contains_key(&d.id))
            .map(|d| d.advertisement(mode))
            .collect();
        drop(inner);

        let shared = self.inner.clone();
        let period = Duration::from_secs(u64::from(period_secs));
        tokio::spawn(async move {
            if !items.is_empty() {
                let report = GatewayMessage::Report(GatewayReport::Advertisement(items));
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = deliver(&shared, report) => {}
                }
            }
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(period) => {}
            }
            if !token.is_cancelled() {
                lock(&shared).scan = None;
                deliver(&shared, GatewayMessage::Event(GatewayEvent::ScanComplete)).await;
            }
        });
        Ok(())
    }

    async fn show_connected(&self) -> Result<Vec<DeviceId>, GatewayError> {
        self.lock().counters.show_connected += 1;
        Ok(self.connected_ids())
    }

    async fn connect(&self, request: &ConnectRequest) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        inner.counters.connects += 1;
        let Some(device) = inner.devices.iter().find(|d| d.id == request.device).cloned() else {
            return Err(GatewayError::rejected("connect", format!("unknown device {}", request.device)));
        };
        if device.reject_connect {
            return Err(GatewayError::rejected("connect", "connection failed to be established"));
        }
        if inner.connected.contains_key(&device.id) {
            return Err(GatewayError::rejected("connect", "already connected"));
        }
        debug!(
            "Simulated connect to {} ({:?}, {:?})",
            device.id, request.address_type, request.params
        );
        inner.connected.insert(
            device.id.clone(),
            Connection {
                device,
                subscriptions: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn disconnect(&self, target: &DisconnectTarget) -> Result<(), GatewayError> {
        let removed: Vec<DeviceId> = {
            let mut inner = self.lock();
            inner.counters.disconnects += 1;
            match target {
                DisconnectTarget::All => {
                    if inner.failures.disconnect_all {
                        return Err(GatewayError::rejected("disconnect", "busy"));
                    }
                    inner
                        .connected
                        .drain()
                        .map(|(id, mut connection)| {
                            connection.drop_subscriptions();
                            id
                        })
                        .collect()
                }
                DisconnectTarget::Device(id) => match inner.connected.remove(id) {
                    Some(mut connection) => {
                        connection.drop_subscriptions();
                        vec![id.clone()]
                    }
                    None => {
                        return Err(GatewayError::rejected("disconnect", format!("{} is not connected", id)));
                    }
                },
            }
        };
        for device in removed {
            self.push(GatewayMessage::Event(GatewayEvent::Disconnect {
                device,
                reason: REASON_LOCAL_HOST,
            }));
        }
        Ok(())
    }

    async fn services(&self, device: &DeviceId) -> Result<Vec<GattEntry>, GatewayError> {
        let mut inner = self.lock();
        inner.counters.services += 1;
        if inner.failures.service_discovery {
            return Err(GatewayError::rejected("service discovery", "GATT procedure timed out"));
        }
        let connection = inner
            .connected
            .get(device)
            .ok_or_else(|| GatewayError::rejected("service discovery", format!("{} is not connected", device)))?;
        Ok(connection.device.layout().into_iter().map(|s| s.entry).collect())
    }

    async fn characteristics(
        &self,
        device: &DeviceId,
        start_handle: u16,
        end_handle: u16,
    ) -> Result<Vec<GattEntry>, GatewayError> {
        let mut inner = self.lock();
        inner.counters.characteristics += 1;
        if inner.failures.service_discovery {
            return Err(GatewayError::rejected("characteristic discovery", "GATT procedure timed out"));
        }
        let connection = inner.connected.get(device).ok_or_else(|| {
            GatewayError::rejected("characteristic discovery", format!("{} is not connected", device))
        })?;
        Ok(connection
            .device
            .layout()
            .into_iter()
            .flat_map(|s| s.characteristics)
            .map(|c| c.entry)
            .filter(|e| (start_handle..=end_handle).contains(&e.handle))
            .collect())
    }

    async fn write(&self, device: &DeviceId, handle: u16, value: &[u8]) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        inner.counters.writes += 1;
        if inner.failures.writes {
            return Err(GatewayError::rejected("write", "write not permitted"));
        }
        let connection = inner
            .connected
            .get(device)
            .ok_or_else(|| GatewayError::rejected("write", format!("{} is not connected", device)))?;
        match connection.device.characteristic(handle) {
            Some(_) => {
                debug!("Simulated write {:02X?} to {} handle {}", value, device, handle);
                Ok(())
            }
            None => Err(GatewayError::rejected("write", format!("invalid handle {}", handle))),
        }
    }

    async fn subscribe(&self, device: &DeviceId, handle: u16, notify: bool) -> Result<(), GatewayError> {
        let (model, channel_base, token) = {
            let mut inner = self.lock();
            inner.counters.subscribes += 1;
            if inner.failures.writes {
                return Err(GatewayError::rejected("subscribe", "write not permitted"));
            }
            let connection = inner
                .connected
                .get_mut(device)
                .ok_or_else(|| GatewayError::rejected("subscribe", format!("{} is not connected", device)))?;
            let Some(characteristic) = connection.device.characteristic(handle) else {
                return Err(GatewayError::rejected("subscribe", format!("invalid handle {}", handle)));
            };
            let Some(CharacteristicRole::Data { model, channel_base }) = characteristic.role else {
                return Err(GatewayError::rejected("subscribe", format!("handle {} does not notify", handle)));
            };
            if let Some(previous) = connection.subscriptions.remove(&handle) {
                previous.cancel();
            }
            if !notify {
                return Ok(());
            }
            let token = CancellationToken::new();
            connection.subscriptions.insert(handle, token.clone());
            (model, channel_base, token)
        };
        self.spawn_notifier(device.clone(), handle, model, channel_base, token);
        Ok(())
    }

    async fn attach(&self, sender: mpsc::Sender<GatewayMessage>) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        if !inner.open {
            return Err(GatewayError::NotOpen);
        }
        inner.sender = Some(sender);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::constants::*;
    use crate::core::bluetooth::profile::SENSORTAG_PROFILE;
    use crate::core::codec;

    async fn open_gateway(devices: Vec<SimulatedDevice>) -> (SimulatedGateway, mpsc::Receiver<GatewayMessage>) {
        let gateway = SimulatedGateway::new(devices);
        gateway.select(DEFAULT_GATEWAY_ID).await.unwrap();
        gateway.open().await.unwrap();
        let (tx, rx) = mpsc::channel(16);
        gateway.attach(tx).await.unwrap();
        (gateway, rx)
    }

    #[test]
    fn layout_matches_the_profile() {
        let layout = gatt_layout(Some(DeviceFamily::SensorTag));
        assert_eq!(layout.len(), 1 + SENSORTAG_PROFILE.services.len());
        for service in &layout {
            for c in &service.characteristics {
                assert!(c.entry.handle > service.entry.handle);
                assert!(c.entry.handle <= service.entry.end_handle);
            }
        }
    }

    #[test]
    fn large_fleets_get_distinct_addresses() {
        let gateway = SimulatedGateway::fleet(300, 2);
        let mut ids: Vec<DeviceId> = lock(&gateway.inner).devices.iter().map(|d| d.id.clone()).collect();
        assert!(ids.iter().all(|id| id.as_str().len() == 12));
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 302);
        assert_eq!(fleet_address(0x51, 0x0102), "02015100b0a0");
    }

    #[test]
    fn synthetic_payloads_decode() {
        for model in [
            SensorModel::Hdc1000,
            SensorModel::Bmp280,
            SensorModel::Tmp007,
            SensorModel::Mpu9250,
            SensorModel::Opt3001,
            SensorModel::Float32,
        ] {
            let payload = synthetic_payload(model, 0, 3);
            assert_eq!(payload.len(), model.payload_len(), "{:?}", model);
            assert!(codec::decode(model, &payload).is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn scan_reports_then_completes() {
        let (gateway, mut rx) = open_gateway(vec![
            SimulatedDevice::sensortag("a0"),
            SimulatedDevice::unknown("b0", "Headphones"),
        ])
        .await;
        gateway.scan(ScanMode::Passive, 2).await.unwrap();

        match rx.recv().await {
            Some(GatewayMessage::Report(GatewayReport::Advertisement(items))) => {
                assert_eq!(items.len(), 2);
                assert!(items.iter().all(|i| i.scan_response.is_empty()));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(rx.recv().await, Some(GatewayMessage::Event(GatewayEvent::ScanComplete)));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_all_emits_events_and_stops_notifications() {
        let (gateway, mut rx) = open_gateway(vec![SimulatedDevice::humigadget("a0")]).await;
        gateway.force_connected(&DeviceId::new("a0"));
        let handle = gateway
            .characteristics(&DeviceId::new("a0"), 0, u16::MAX)
            .await
            .unwrap()
            .into_iter()
            .find(|c| c.uuid == UUID_HUMIGADGET_TEMPERATURE_DATA)
            .unwrap()
            .handle;
        gateway.subscribe(&DeviceId::new("a0"), handle, true).await.unwrap();
        assert_eq!(gateway.active_subscriptions(), 1);

        match rx.recv().await {
            Some(GatewayMessage::Report(GatewayReport::Notification { device, notifications })) => {
                assert_eq!(device, DeviceId::new("a0"));
                assert_eq!(notifications[0].handle, handle);
            }
            other => panic!("unexpected {:?}", other),
        }

        gateway.disconnect(&DisconnectTarget::All).await.unwrap();
        assert_eq!(gateway.active_subscriptions(), 0);
        assert!(gateway.connected_ids().is_empty());
        loop {
            match rx.recv().await {
                Some(GatewayMessage::Event(GatewayEvent::Disconnect { device, .. })) => {
                    assert_eq!(device, DeviceId::new("a0"));
                    break;
                }
                Some(_) => continue,
                None => panic!("channel closed"),
            }
        }
    }

    #[tokio::test]
    async fn rejected_connect_leaves_device_disconnected() {
        let (gateway, _rx) = open_gateway(vec![SimulatedDevice::sensortag("a0").rejecting_connect()]).await;
        let request = ConnectRequest {
            device: DeviceId::new("a0"),
            address_type: AddressType::Public,
            params: SENSORTAG_PROFILE.connection,
        };
        assert!(gateway.connect(&request).await.is_err());
        assert!(gateway.show_connected().await.unwrap().is_empty());
        assert_eq!(gateway.counters().connects, 1);
    }

    #[tokio::test]
    async fn version_requires_an_open_session() {
        let gateway = SimulatedGateway::new(vec![]);
        assert!(matches!(gateway.version().await, Err(GatewayError::NotOpen)));
    }
}
