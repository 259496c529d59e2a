//! Device registry: the process-wide mirror of device state.
//!
//! The registry is the single source of truth the UI renders from. Every
//! write goes through [`DeviceRegistry::upsert`], which merges a
//! [`DevicePatch`] and, when something actually changed, notifies the
//! subscribers in registration order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use homesync_domain::device::{Device, DevicePatch};
use homesync_domain::error::ValidationError;
use homesync_domain::id::DeviceId;

/// Handle returned by [`DeviceRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&Device) + Send + Sync>;

#[derive(Default)]
struct Table {
    devices: Vec<Device>,
    index: HashMap<DeviceId, usize>,
}

/// Ordered, observable collection of devices keyed by id.
#[derive(Default)]
pub struct DeviceRegistry {
    table: RwLock<Table>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
}

impl DeviceRegistry {
    /// Build a registry from an initial fleet, preserving its order.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when a device is invalid or an id
    /// appears twice.
    pub fn new(fleet: impl IntoIterator<Item = Device>) -> Result<Self, ValidationError> {
        let mut table = Table::default();
        for device in fleet {
            device.validate()?;
            if table.index.contains_key(&device.id) {
                return Err(ValidationError::DuplicateDevice(device.id.to_string()));
            }
            table.index.insert(device.id.clone(), table.devices.len());
            table.devices.push(device);
        }
        Ok(Self {
            table: RwLock::new(table),
            ..Self::default()
        })
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Device> {
        let table = self.read();
        table.index.get(id).map(|&idx| table.devices[idx].clone())
    }

    /// Every device, in fleet order.
    #[must_use]
    pub fn list(&self) -> Vec<Device> {
        self.read().devices.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().devices.is_empty()
    }

    /// Number of devices whose status is anything but offline.
    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.read()
            .devices
            .iter()
            .filter(|device| device.status.is_online())
            .count()
    }

    /// Devices grouped by room, rooms in order of first appearance.
    #[must_use]
    pub fn by_room(&self) -> Vec<(String, Vec<Device>)> {
        let mut rooms: Vec<(String, Vec<Device>)> = Vec::new();
        for device in &self.read().devices {
            match rooms.iter_mut().find(|(room, _)| *room == device.room) {
                Some((_, devices)) => devices.push(device.clone()),
                None => rooms.push((device.room.clone(), vec![device.clone()])),
            }
        }
        rooms
    }

    /// Merge `patch` into the device with `id`.
    ///
    /// Returns `true` when the device exists and its state changed; only
    /// then are subscribers notified. Unknown ids are ignored.
    pub fn upsert(&self, id: &str, patch: &DevicePatch) -> bool {
        let updated = {
            let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
            let Some(&idx) = table.index.get(id) else {
                tracing::debug!(device_id = id, "ignoring update for unknown device");
                return false;
            };
            let device = &mut table.devices[idx];
            if !device.apply(patch) {
                return false;
            }
            device.clone()
        };

        tracing::debug!(device_id = id, status = %updated.status, "device updated");
        self.notify(&updated);
        true
    }

    /// Register `listener` to be called with every changed device.
    ///
    /// Listeners run on the writer's thread, after the registry lock has been
    /// released, so they may read the registry.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Device) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` when it was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn notify(&self, device: &Device) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(device);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Table> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }
}
