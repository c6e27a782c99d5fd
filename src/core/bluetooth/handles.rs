//! GATT handle cache
//! Resolves a family's declared UUIDs to live handles on one connected device and keeps
//! the result for every other device of that family.

use std::collections::HashMap;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::core::bluetooth::gateway::{Gateway, GattEntry, GatewayError};
use crate::core::bluetooth::profile::{DeviceFamily, DeviceProfile};
use crate::core::bluetooth::types::DeviceId;
use crate::state::SharedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedHandle {
    pub handle: u16,
    pub properties: Option<u8>,
}

/// Characteristic UUID to handle mapping for one family
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GattHandleTable {
    entries: HashMap<Uuid, ResolvedHandle>,
    resolved: bool,
}

impl GattHandleTable {
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Handle of a declared characteristic; `None` when it was not found on the device
    pub fn handle(&self, uuid: Uuid) -> Option<u16> {
        self.entries.get(&uuid).map(|r| r.handle)
    }

    pub fn insert(&mut self, uuid: Uuid, resolved: ResolvedHandle) {
        self.entries.insert(uuid, resolved);
    }

    pub fn mark_resolved(&mut self) {
        self.resolved = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn find_entry(uuid: Uuid, entries: &[GattEntry]) -> Option<&GattEntry> {
    entries.iter().find(|e| e.uuid == uuid)
}

/// Resolves `profile` against `device`, unless `current` is already resolved.
///
/// Missing services or characteristics leave their handles absent; the table is marked
/// resolved after a single pass either way. Only a failing listing request is an error.
pub async fn resolve<G: Gateway + ?Sized>(
    gateway: &G,
    device: &DeviceId,
    profile: &DeviceProfile,
    current: &GattHandleTable,
) -> Result<GattHandleTable, GatewayError> {
    if current.is_resolved() {
        return Ok(current.clone());
    }

    info!("Resolving GATT handles for {:?} on {}", profile.family, device.display_address());
    let mut table = GattHandleTable::default();
    let services = gateway.services(device).await?;

    for service in profile.services {
        let Some(entry) = find_entry(service.uuid, &services) else {
            warn!("Service {} not found on {}", service.uuid, device.display_address());
            continue;
        };
        let characteristics = gateway
            .characteristics(device, entry.handle, entry.end_handle)
            .await?;
        for declared in service.characteristics {
            match find_entry(declared.uuid, &characteristics) {
                Some(c) => {
                    debug!("Characteristic {} -> handle {}", declared.uuid, c.handle);
                    table.insert(
                        declared.uuid,
                        ResolvedHandle {
                            handle: c.handle,
                            properties: c.properties,
                        },
                    );
                }
                None => warn!("Characteristic {} not found on {}", declared.uuid, device.display_address()),
            }
        }
    }

    table.mark_resolved();
    Ok(table)
}

/// Resolves the family's cached table in `state`, storing the result.
pub async fn resolve_cached<G: Gateway + ?Sized>(
    gateway: &G,
    state: &SharedState,
    device: &DeviceId,
    family: DeviceFamily,
) -> Result<GattHandleTable, GatewayError> {
    let current = state.lock().await.handle_table(family);
    if current.is_resolved() {
        return Ok(current);
    }

    let table = resolve(gateway, device, family.profile(), &current).await?;
    state.lock().await.store_handle_table(family, table.clone());
    Ok(table)
}
