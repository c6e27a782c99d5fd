//! Notification handling for connected sensors
//! This module turns notification reports into telemetry records, logs them and appends them
//! to the data file.

use log::{debug, info, warn};

use crate::core::bluetooth::gateway::NotificationItem;
use crate::core::bluetooth::profile::ChannelReading;
use crate::core::bluetooth::types::{DeviceId, TelemetryRecord};
use crate::error::OrchestratorError;
use crate::sink::{SharedSink, SinkError};
use crate::state::SharedState;

/// Notification handler for sensor data
#[derive(Clone, Default)]
pub struct NotificationHandler {
    /// Data file, when the user asked for one
    sink: Option<SharedSink>,
}

impl NotificationHandler {
    pub fn new(sink: Option<SharedSink>) -> Self {
        Self { sink }
    }

    /// Routes one notification report to the routine bound to `device`.
    ///
    /// Reports from devices that are not connected, or not configured yet, are dropped.
    /// A payload that does not decode is logged and skipped. Returns the number of records
    /// emitted.
    pub async fn handle(
        &self,
        state: &SharedState,
        device: &DeviceId,
        notifications: &[NotificationItem],
    ) -> Result<usize, OrchestratorError> {
        let (family, table) = {
            let state = state.lock().await;
            let Some(family) = state.connected(device).and_then(|d| d.handler) else {
                debug!("Dropping notification from {}", device.display_address());
                return Ok(0);
            };
            (family, state.handle_table(family))
        };
        let Some(item) = notifications.first() else {
            return Ok(0);
        };

        let readings = match family.behavior().decode(&table, item) {
            Ok(readings) => readings,
            Err(e) => {
                warn!("[{}] {}", device.display_address(), OrchestratorError::from(e));
                return Ok(0);
            }
        };
        if readings.is_empty() {
            return Ok(0);
        }

        info!(
            "N: [{}][{}][{}] {}",
            item.timestamp.to_local_string(),
            device.display_address(),
            item.handle,
            format_readings(&readings)
        );

        if let Some(sink) = &self.sink {
            let mut sink = sink.lock().map_err(|_| SinkError::Poisoned)?;
            for reading in &readings {
                sink.append(&TelemetryRecord {
                    timestamp: item.timestamp,
                    device: device.clone(),
                    handle: item.handle,
                    channel: reading.channel,
                    value: reading.measurement.value,
                })?;
            }
        }
        Ok(readings.len())
    }

    /// Flushes the data file, if any
    pub fn flush(&self) -> Result<(), SinkError> {
        match &self.sink {
            Some(sink) => sink.lock().map_err(|_| SinkError::Poisoned)?.flush(),
            None => Ok(()),
        }
    }
}

/// `T=21.50 degC RH=45.00 %`
fn format_readings(readings: &[ChannelReading]) -> String {
    readings
        .iter()
        .map(|r| {
            let quantity = r.measurement.quantity;
            format!("{}={:.2} {}", quantity.label(), r.measurement.value, quantity.unit())
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join(" ")
}
