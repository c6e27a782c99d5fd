//! Advertisement scanning
//! Starts and stops scan cycles on the gateway and folds advertisement reports into the
//! discovery map.

use std::sync::Arc;

use log::{debug, info};

use crate::core::bluetooth::gateway::{AdvertisementItem, Gateway, GatewayError};
use crate::core::bluetooth::profile::DeviceFamily;
use crate::core::bluetooth::types::{AdvertisedDevice, OrchestratorState, ScanMode};
use crate::state::{SessionState, SharedState};

/// Runs scan cycles on the gateway and collects matching advertisements
pub struct AdvertisementScanner<G: Gateway + ?Sized> {
    gateway: Arc<G>,
    state: SharedState,
    mode: ScanMode,
    period_secs: u32,
}

impl<G: Gateway + ?Sized> Clone for AdvertisementScanner<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            state: self.state.clone(),
            mode: self.mode,
            period_secs: self.period_secs,
        }
    }
}

impl<G: Gateway + ?Sized> AdvertisementScanner<G> {
    pub fn new(gateway: Arc<G>, state: SharedState, mode: ScanMode, period_secs: u32) -> Self {
        Self {
            gateway,
            state,
            mode,
            period_secs,
        }
    }

    /// Starts a new scan cycle. The discovery map is emptied first; the gateway
    /// signals the end of the cycle with a scan-complete event.
    pub async fn start_scan(&self) -> Result<(), GatewayError> {
        {
            let mut state = self.state.lock().await;
            state.clear_discovered();
            state.set_phase(OrchestratorState::Scanning);
        }
        info!("Scanning ({:?}, {} s)...", self.mode, self.period_secs);
        self.gateway.scan(self.mode, self.period_secs).await
    }

    pub async fn stop_scan(&self) -> Result<(), GatewayError> {
        info!("Stopping scan.");
        self.gateway.scan(self.mode, 0).await
    }
}

/// Merges one advertisement batch into the discovery map.
///
/// Each family filters the batch on its own, so an advertisement matching several
/// families is merged once per match. Returns the number of merged records.
pub fn merge_advertisements(state: &mut SessionState, items: &[AdvertisementItem]) -> usize {
    let parsed: Vec<AdvertisedDevice> = items.iter().map(AdvertisedDevice::from_item).collect();
    let mut merged = 0;
    for family in DeviceFamily::ALL {
        for device in parsed.iter().filter(|d| d.is_family(family)) {
            debug!("Found {:?} device: {}", family, device.summary());
            state.merge_discovered(device.clone());
            merged += 1;
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::gateway::AdField;
    use crate::core::bluetooth::types::{AddressType, DeviceId, Timestamp};
    use crate::simulator::{SimulatedDevice, SimulatedGateway};

    fn item(id: &str, name: &str, rssi: i16) -> AdvertisementItem {
        AdvertisementItem {
            timestamp: Timestamp::new(10, 0),
            device: DeviceId::new(id),
            address_type: AddressType::Public,
            event_type: 0,
            rssi,
            advertisement: vec![AdField {
                ad_type: 0x09,
                value: name.to_string(),
            }],
            scan_response: vec![],
        }
    }

    #[test]
    fn only_known_families_are_merged() {
        let mut state = SessionState::default();
        let merged = merge_advertisements(
            &mut state,
            &[
                item("a0", "CC2650 SensorTag", -50),
                item("a1", "Smart Humigadget", -60),
                item("a2", "Headphones", -30),
            ],
        );
        assert_eq!(merged, 2);
        assert_eq!(state.discovered_count(), 2);
        assert!(state.discovered(&DeviceId::new("a2")).is_none());
    }

    #[test]
    fn repeated_sightings_overwrite() {
        let mut state = SessionState::default();
        merge_advertisements(&mut state, &[item("a0", "CC2650 SensorTag", -80)]);
        merge_advertisements(&mut state, &[item("a0", "CC2650 SensorTag", -45)]);
        assert_eq!(state.discovered_count(), 1);
        assert_eq!(state.discovered(&DeviceId::new("a0")).unwrap().rssi, -45);
    }

    #[tokio::test]
    async fn new_scan_clears_previous_discoveries() {
        let gateway = Arc::new(SimulatedGateway::new(vec![SimulatedDevice::sensortag("a0")]));
        let state = SessionState::shared();
        merge_advertisements(&mut *state.lock().await, &[item("ff", "CC2650 SensorTag", -50)]);

        let scanner = AdvertisementScanner::new(gateway.clone(), state.clone(), ScanMode::Active, 1);
        scanner.start_scan().await.unwrap();

        let state = state.lock().await;
        assert_eq!(state.discovered_count(), 0);
        assert_eq!(state.phase(), OrchestratorState::Scanning);
        assert_eq!(gateway.counters().scans, 1);
    }
}
