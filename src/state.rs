//! Session state management
//! All mutable state of one gateway session lives here and is shared between the
//! orchestrator's steps and the event/report dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use log::info;
use tokio::sync::Mutex;

use crate::core::bluetooth::handles::GattHandleTable;
use crate::core::bluetooth::profile::DeviceFamily;
use crate::core::bluetooth::types::{AdvertisedDevice, ConnectedDevice, DeviceId, OrchestratorState};

pub type SharedState = Arc<Mutex<SessionState>>;

#[derive(Debug)]
pub struct SessionState {
    /// Last advertisement per device in the current scan cycle
    discovered: HashMap<DeviceId, AdvertisedDevice>,
    /// Devices the gateway holds a connection to
    connected: HashMap<DeviceId, ConnectedDevice>,
    /// Resolved GATT handles per family
    handle_tables: HashMap<DeviceFamily, GattHandleTable>,
    phase: OrchestratorState,
    /// Set once shutdown has begun
    exiting: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            discovered: HashMap::new(),
            connected: HashMap::new(),
            handle_tables: HashMap::new(),
            phase: OrchestratorState::Idle,
            exiting: false,
        }
    }
}

impl SessionState {
    pub fn shared() -> SharedState {
        Arc::new(Mutex::new(Self::default()))
    }

    pub fn phase(&self) -> OrchestratorState {
        self.phase
    }

    pub fn set_phase(&mut self, phase: OrchestratorState) {
        if self.phase != phase {
            info!("State {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    pub fn is_exiting(&self) -> bool {
        self.exiting
    }

    pub fn begin_exit(&mut self) {
        self.exiting = true;
        self.set_phase(OrchestratorState::ShuttingDown);
    }

    pub fn clear_discovered(&mut self) {
        self.discovered.clear();
    }

    /// Records an advertisement; a newer sighting replaces the older one wholesale.
    pub fn merge_discovered(&mut self, device: AdvertisedDevice) {
        self.discovered.insert(device.id.clone(), device);
    }

    pub fn discovered(&self, id: &DeviceId) -> Option<&AdvertisedDevice> {
        self.discovered.get(id)
    }

    /// Discovered devices sorted by address
    pub fn discovered_list(&self) -> Vec<AdvertisedDevice> {
        let mut devices: Vec<_> = self.discovered.values().cloned().collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    pub fn discovered_count(&self) -> usize {
        self.discovered.len()
    }

    pub fn insert_connected(&mut self, device: ConnectedDevice) {
        self.connected.insert(device.id.clone(), device);
    }

    pub fn remove_connected(&mut self, id: &DeviceId) -> Option<ConnectedDevice> {
        self.connected.remove(id)
    }

    pub fn connected(&self, id: &DeviceId) -> Option<&ConnectedDevice> {
        self.connected.get(id)
    }

    pub fn is_connected(&self, id: &DeviceId) -> bool {
        self.connected.contains_key(id)
    }

    pub fn connected_count(&self) -> usize {
        self.connected.len()
    }

    pub fn clear_connected(&mut self) {
        self.connected.clear();
    }

    /// Attaches `family`'s notification routine to a connected device.
    /// Returns false when the device is no longer connected.
    pub fn bind_handler(&mut self, id: &DeviceId, family: DeviceFamily) -> bool {
        match self.connected.get_mut(id) {
            Some(device) => {
                device.handler = Some(family);
                true
            }
            None => false,
        }
    }

    pub fn handle_table(&self, family: DeviceFamily) -> GattHandleTable {
        self.handle_tables.get(&family).cloned().unwrap_or_default()
    }

    pub fn store_handle_table(&mut self, family: DeviceFamily, table: GattHandleTable) {
        self.handle_tables.insert(family, table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::types::{AddressType, Timestamp};

    fn advert(id: &str, rssi: i16) -> AdvertisedDevice {
        AdvertisedDevice {
            id: DeviceId::new(id),
            address_type: AddressType::Public,
            event_type: 0,
            rssi,
            name: "CC2650 SensorTag".to_string(),
            timestamp: Timestamp::new(100, 0),
        }
    }

    #[test]
    fn discovery_merge_is_last_write_wins() {
        let mut state = SessionState::default();
        state.merge_discovered(advert("a0", -70));
        state.merge_discovered(advert("a1", -60));
        state.merge_discovered(advert("a0", -40));

        assert_eq!(state.discovered_count(), 2);
        assert_eq!(state.discovered(&DeviceId::new("a0")).unwrap().rssi, -40);

        state.clear_discovered();
        assert_eq!(state.discovered_count(), 0);
    }

    #[test]
    fn connecting_keeps_the_discovery_record() {
        let mut state = SessionState::default();
        state.merge_discovered(advert("a0", -70));
        state.insert_connected(ConnectedDevice::new(DeviceId::new("a0"), AddressType::Public));

        assert!(state.is_connected(&DeviceId::new("a0")));
        assert!(state.discovered(&DeviceId::new("a0")).is_some());
    }

    #[test]
    fn binding_requires_a_connected_device() {
        let mut state = SessionState::default();
        let id = DeviceId::new("a0");
        assert!(!state.bind_handler(&id, DeviceFamily::SensorTag));

        state.insert_connected(ConnectedDevice::new(id.clone(), AddressType::Random));
        assert!(state.bind_handler(&id, DeviceFamily::SensorTag));
        assert_eq!(state.connected(&id).unwrap().handler, Some(DeviceFamily::SensorTag));
    }

    #[test]
    fn begin_exit_moves_to_shutting_down() {
        let mut state = SessionState::default();
        assert!(!state.is_exiting());
        state.begin_exit();
        assert!(state.is_exiting());
        assert_eq!(state.phase(), OrchestratorState::ShuttingDown);
    }
}
