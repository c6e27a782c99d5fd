//! Advertised device parsing and family matching

use crate::core::bluetooth::constants::{AD_TYPE_COMPLETE_NAME, AD_TYPE_SHORT_NAME};
use crate::core::bluetooth::gateway::{AdField, AdvertisementItem};
use crate::core::bluetooth::profile::DeviceFamily;
use crate::core::bluetooth::types::AdvertisedDevice;

/// Name carried in the advertisement, falling back to the scan response.
/// The first name field found wins; no name yields an empty string.
pub fn advertised_name(advertisement: &[AdField], scan_response: &[AdField]) -> String {
    advertisement
        .iter()
        .chain(scan_response.iter())
        .find(|f| f.ad_type == AD_TYPE_SHORT_NAME || f.ad_type == AD_TYPE_COMPLETE_NAME)
        .map(|f| f.value.clone())
        .unwrap_or_default()
}

impl AdvertisedDevice {
    /// Creates a discovery record from one advertisement report item
    pub fn from_item(item: &AdvertisementItem) -> Self {
        Self {
            id: item.device.clone(),
            address_type: item.address_type,
            event_type: item.event_type,
            rssi: item.rssi,
            name: advertised_name(&item.advertisement, &item.scan_response),
            timestamp: item.timestamp,
        }
    }

    /// Returns true if this device belongs to `family`
    pub fn is_family(&self, family: DeviceFamily) -> bool {
        family.matches(&self.name)
    }

    /// One line for the selection list: `[AA:BB:..] -60dBm name`
    pub fn summary(&self) -> String {
        format!("[{}] {}dBm {}", self.id.display_address(), self.rssi, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::types::{AddressType, DeviceId, Timestamp};

    fn field(ad_type: u8, value: &str) -> AdField {
        AdField {
            ad_type,
            value: value.to_string(),
        }
    }

    #[test]
    fn name_prefers_the_advertisement() {
        let adv = vec![field(0x01, "06"), field(0x09, "CC2650 SensorTag")];
        let rsp = vec![field(0x09, "other")];
        assert_eq!(advertised_name(&adv, &rsp), "CC2650 SensorTag");
    }

    #[test]
    fn name_falls_back_to_scan_response() {
        let adv = vec![field(0x01, "06")];
        let rsp = vec![field(0x08, "Smart Humigadget")];
        assert_eq!(advertised_name(&adv, &rsp), "Smart Humigadget");
        assert_eq!(advertised_name(&adv, &[]), "");
    }

    #[test]
    fn record_keeps_advertisement_details() {
        let item = AdvertisementItem {
            timestamp: Timestamp::new(1_500_000_000, 12),
            device: DeviceId::new("112233aabbcc"),
            address_type: AddressType::Random,
            event_type: 4,
            rssi: -58,
            advertisement: vec![],
            scan_response: vec![field(0x09, "CC2650 SensorTag")],
        };
        let device = AdvertisedDevice::from_item(&item);
        assert_eq!(device.id, DeviceId::new("112233aabbcc"));
        assert_eq!(device.address_type, AddressType::Random);
        assert_eq!(device.event_type, 4);
        assert!(device.is_family(DeviceFamily::SensorTag));
        assert!(!device.is_family(DeviceFamily::Humigadget));
        assert_eq!(device.summary(), "[CC:BB:AA:33:22:11] -58dBm CC2650 SensorTag");
    }
}
