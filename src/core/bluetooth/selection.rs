//! Device selection
//! Picking which discovered devices to connect is left to a [`DeviceSelector`]; the binary
//! ships a non-interactive one.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use log::info;

use crate::core::bluetooth::types::{AdvertisedDevice, Selection};

#[async_trait]
pub trait DeviceSelector: Send + Sync {
    /// Chooses among the devices found by the last scan, sorted by address.
    async fn select(&self, discovered: &[AdvertisedDevice]) -> Selection;
}

/// Selects every discovered device.
///
/// An empty scan is retried up to `max_rescans` times in a row before giving up.
#[derive(Debug)]
pub struct AutoSelector {
    max_rescans: u32,
    rescans: AtomicU32,
}

impl AutoSelector {
    pub fn new(max_rescans: u32) -> Self {
        Self {
            max_rescans,
            rescans: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl DeviceSelector for AutoSelector {
    async fn select(&self, discovered: &[AdvertisedDevice]) -> Selection {
        if discovered.is_empty() {
            let rescans = self.rescans.fetch_add(1, Ordering::SeqCst);
            if rescans < self.max_rescans {
                info!("No devices found, rescanning ({}/{})", rescans + 1, self.max_rescans);
                return Selection::Rescan;
            }
            info!("No devices found after {} rescans", self.max_rescans);
            return Selection::Exit;
        }

        self.rescans.store(0, Ordering::SeqCst);
        for (index, device) in discovered.iter().enumerate() {
            info!("{}: {}", index + 1, device.summary());
        }
        Selection::Connect(discovered.iter().map(|d| d.id.clone()).collect())
    }
}
