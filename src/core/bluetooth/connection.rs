//! Device connection handling
//! This module connects the selected devices of a family and instruments them once the
//! family's GATT handles are known.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::core::bluetooth::commands::{CommandExecutor, GatewayCommandSender};
use crate::core::bluetooth::gateway::{ConnectRequest, DisconnectTarget, Gateway, GatewayError};
use crate::core::bluetooth::handles::{GattHandleTable, resolve_cached};
use crate::core::bluetooth::profile::{DeviceFamily, FamilyBehavior, SensorSettings};
use crate::core::bluetooth::types::{AdvertisedDevice, ConnectedDevice, DeviceId, OrchestratorState};
use crate::error::OrchestratorError;
use crate::state::SharedState;

/// Connection manager for the sensor fleet
pub struct ConnectionManager<G: Gateway + ?Sized> {
    gateway: Arc<G>,
    state: SharedState,
}

impl<G: Gateway + ?Sized> Clone for ConnectionManager<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            state: self.state.clone(),
        }
    }
}

impl<G: Gateway + ?Sized> ConnectionManager<G> {
    pub fn new(gateway: Arc<G>, state: SharedState) -> Self {
        Self { gateway, state }
    }

    /// Connects every selected device of `family`, one request at a time.
    ///
    /// A rejected connect is logged and the device left out; the remaining devices are still
    /// attempted. Returns the ids that connected, in selection order.
    pub async fn connect_family(&self, family: DeviceFamily, selected: &[AdvertisedDevice]) -> Vec<DeviceId> {
        let params = family.profile().connection;
        let mut connected = Vec::new();

        for device in selected.iter().filter(|d| d.is_family(family)) {
            info!("Connecting to {:?} {}...", family, device.id.display_address());
            let request = ConnectRequest {
                device: device.id.clone(),
                address_type: device.address_type,
                params,
            };
            match self.gateway.connect(&request).await {
                Ok(()) => {
                    self.state
                        .lock()
                        .await
                        .insert_connected(ConnectedDevice::new(device.id.clone(), device.address_type));
                    info!("Connected to {}", device.id.display_address());
                    connected.push(device.id.clone());
                }
                Err(source) => {
                    let err = OrchestratorError::ConnectFailure {
                        device: device.id.clone(),
                        source,
                    };
                    warn!("{}", err);
                }
            }
        }
        connected
    }

    /// Resolves the family's handles on its first still-connected device, then configures
    /// every connected device of the family and binds its notification routine.
    ///
    /// Only a failing resolution is returned as an error; per-device configuration failures
    /// are logged and leave the device connected but silent.
    pub async fn configure_family(
        &self,
        family: DeviceFamily,
        connected: &[DeviceId],
        settings: &SensorSettings,
    ) -> Result<(), OrchestratorError> {
        let representative = {
            let state = self.state.lock().await;
            connected.iter().find(|id| state.is_connected(id)).cloned()
        };
        let Some(representative) = representative else {
            debug!("No {:?} device left to configure", family);
            return Ok(());
        };

        self.state.lock().await.set_phase(OrchestratorState::Resolving);
        let table = resolve_cached(&*self.gateway, &self.state, &representative, family)
            .await
            .map_err(|source| OrchestratorError::ResolutionFailure {
                device: representative.clone(),
                source,
            })?;

        self.state.lock().await.set_phase(OrchestratorState::Configuring);
        let behavior = family.behavior();
        for id in connected {
            match self.configure_device(behavior, &table, id, settings).await {
                Ok(()) => info!("Configured {:?} {}", family, id.display_address()),
                Err(e) => warn!("{}", e),
            }
            if !self.state.lock().await.bind_handler(id, family) {
                debug!("{} went away before its notifications were bound", id.display_address());
            }
        }
        Ok(())
    }

    async fn configure_device(
        &self,
        behavior: &dyn FamilyBehavior,
        table: &GattHandleTable,
        id: &DeviceId,
        settings: &SensorSettings,
    ) -> Result<(), OrchestratorError> {
        let commands = behavior
            .configuration(table, settings)
            .map_err(|e| OrchestratorError::configuration(id, e))?;
        let executor = CommandExecutor::new(GatewayCommandSender::new(self.gateway.clone(), id.clone()));
        executor
            .configure(&commands)
            .await
            .map_err(|e| OrchestratorError::configuration(id, e))
    }

    /// Disconnects everything the gateway reports as connected.
    /// Returns the number of devices that were connected.
    pub async fn disconnect_all(&self) -> Result<usize, GatewayError> {
        let devices = self.gateway.show_connected().await?;
        if devices.is_empty() {
            return Ok(0);
        }
        info!("Disconnecting {} device(s)", devices.len());
        self.gateway.disconnect(&DisconnectTarget::All).await?;
        Ok(devices.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::types::{AddressType, Timestamp};
    use crate::simulator::{SimulatedDevice, SimulatedGateway};
    use crate::state::SessionState;

    fn advert(id: &str, name: &str) -> AdvertisedDevice {
        AdvertisedDevice {
            id: DeviceId::new(id),
            address_type: AddressType::Public,
            event_type: 0,
            rssi: -55,
            name: name.to_string(),
            timestamp: Timestamp::new(1, 0),
        }
    }

    fn sensortag(id: &str) -> AdvertisedDevice {
        advert(id, "CC2650 SensorTag")
    }

    fn setup(devices: Vec<SimulatedDevice>) -> (Arc<SimulatedGateway>, SharedState, ConnectionManager<SimulatedGateway>) {
        let gateway = Arc::new(SimulatedGateway::new(devices));
        let state = SessionState::shared();
        let manager = ConnectionManager::new(gateway.clone(), state.clone());
        (gateway, state, manager)
    }

    #[tokio::test]
    async fn rejected_connect_does_not_stop_the_batch() {
        let (gateway, state, manager) = setup(vec![
            SimulatedDevice::sensortag("a0").rejecting_connect(),
            SimulatedDevice::sensortag("a1"),
        ]);
        let connected = manager
            .connect_family(DeviceFamily::SensorTag, &[sensortag("a0"), sensortag("a1")])
            .await;

        assert_eq!(connected, vec![DeviceId::new("a1")]);
        assert_eq!(gateway.counters().connects, 2);
        let state = state.lock().await;
        assert!(!state.is_connected(&DeviceId::new("a0")));
        assert!(state.is_connected(&DeviceId::new("a1")));
    }

    #[tokio::test]
    async fn only_devices_of_the_family_are_connected() {
        let (gateway, _state, manager) = setup(vec![
            SimulatedDevice::sensortag("a0"),
            SimulatedDevice::humigadget("b0"),
        ]);
        let selected = [sensortag("a0"), advert("b0", "Smart Humigadget")];
        let connected = manager.connect_family(DeviceFamily::Humigadget, &selected).await;

        assert_eq!(connected, vec![DeviceId::new("b0")]);
        assert_eq!(gateway.counters().connects, 1);
    }

    #[tokio::test]
    async fn family_is_resolved_once_and_every_device_configured() {
        let (gateway, state, manager) = setup(vec![
            SimulatedDevice::sensortag("a0"),
            SimulatedDevice::sensortag("a1"),
        ]);
        let connected = manager
            .connect_family(DeviceFamily::SensorTag, &[sensortag("a0"), sensortag("a1")])
            .await;
        manager
            .configure_family(DeviceFamily::SensorTag, &connected, &SensorSettings::default())
            .await
            .unwrap();

        let counters = gateway.counters();
        assert_eq!(counters.services, 1);
        assert_eq!(counters.writes, 2);
        assert_eq!(counters.subscribes, 2);
        let state = state.lock().await;
        for id in &connected {
            assert_eq!(state.connected(id).unwrap().handler, Some(DeviceFamily::SensorTag));
        }
        assert_eq!(state.phase(), OrchestratorState::Configuring);
    }

    #[tokio::test]
    async fn configuration_failure_keeps_the_device() {
        let (gateway, state, manager) = setup(vec![SimulatedDevice::humigadget("b0")]);
        let connected = manager
            .connect_family(DeviceFamily::Humigadget, &[advert("b0", "Smart Humigadget")])
            .await;
        gateway.fail_writes(true);

        manager
            .configure_family(DeviceFamily::Humigadget, &connected, &SensorSettings::default())
            .await
            .unwrap();
        assert!(state.lock().await.is_connected(&DeviceId::new("b0")));
        assert_eq!(gateway.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn resolution_failure_is_returned() {
        let (gateway, _state, manager) = setup(vec![SimulatedDevice::sensortag("a0")]);
        let connected = manager
            .connect_family(DeviceFamily::SensorTag, &[sensortag("a0")])
            .await;
        gateway.fail_service_discovery(true);

        let err = manager
            .configure_family(DeviceFamily::SensorTag, &connected, &SensorSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::ResolutionFailure { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn disconnect_all_skips_an_empty_gateway() {
        let (gateway, _state, manager) = setup(vec![SimulatedDevice::sensortag("a0")]);
        assert_eq!(manager.disconnect_all().await.unwrap(), 0);
        assert_eq!(gateway.counters().disconnects, 0);

        gateway.force_connected(&DeviceId::new("a0"));
        assert_eq!(manager.disconnect_all().await.unwrap(), 1);
        assert_eq!(gateway.counters().disconnects, 1);
        assert!(gateway.connected_ids().is_empty());
    }
}
