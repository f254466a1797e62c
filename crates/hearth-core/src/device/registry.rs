use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::device::error::DeviceSystemError;
use crate::device::types::BridgedDevice;
use crate::kernel::component::KernelComponent;
use crate::kernel::constants::DEVICE_NAMESPACE;
use crate::kernel::error::Result;
use crate::storage::context::StorageContext;

/// One registry entry: the plugin that exposed the device, and a reference
/// to the device it owns.
#[derive(Debug, Clone)]
pub struct DeviceEntry {
    pub plugin: String,
    pub device: Arc<BridgedDevice>,
}

/// Serializable form of an entry, used for the shutdown snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedDevice {
    pub plugin: String,
    pub device: BridgedDevice,
}

/// In-memory set of (plugin, device) pairs currently exposed.
///
/// Entries keep insertion order. Devices are deduped per plugin on the
/// device's unique id; the same unique id under two different plugins is
/// two distinct entries.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    entries: Vec<DeviceEntry>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn position(&self, plugin: &str, unique_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.plugin == plugin && e.device.unique_id() == unique_id)
    }

    /// Register `device` under `plugin`.
    pub fn add(&mut self, plugin: &str, device: Arc<BridgedDevice>) -> Result<()> {
        if self.position(plugin, device.unique_id()).is_some() {
            return Err(DeviceSystemError::DuplicateDevice {
                plugin: plugin.to_string(),
                unique_id: device.unique_id().to_string(),
            }
            .into());
        }
        self.entries.push(DeviceEntry {
            plugin: plugin.to_string(),
            device,
        });
        Ok(())
    }

    /// Remove the device with `unique_id` under `plugin`, returning it.
    pub fn remove(&mut self, plugin: &str, unique_id: &str) -> Result<Arc<BridgedDevice>> {
        match self.position(plugin, unique_id) {
            Some(index) => Ok(self.entries.remove(index).device),
            None => Err(DeviceSystemError::DeviceNotFound {
                plugin: plugin.to_string(),
                unique_id: unique_id.to_string(),
            }
            .into()),
        }
    }

    /// Remove every device `plugin` exposed, returning them in registry order.
    pub fn remove_all_for_plugin(&mut self, plugin: &str) -> Vec<Arc<BridgedDevice>> {
        let mut removed = Vec::new();
        self.entries.retain(|entry| {
            if entry.plugin == plugin {
                removed.push(Arc::clone(&entry.device));
                false
            } else {
                true
            }
        });
        removed
    }

    /// Devices currently exposed by `plugin`, in registration order.
    pub fn devices_for_plugin(&self, plugin: &str) -> Vec<Arc<BridgedDevice>> {
        self.entries
            .iter()
            .filter(|e| e.plugin == plugin)
            .map(|e| Arc::clone(&e.device))
            .collect()
    }

    pub fn count_for_plugin(&self, plugin: &str) -> usize {
        self.entries.iter().filter(|e| e.plugin == plugin).count()
    }

    pub fn entries(&self) -> &[DeviceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Owned snapshot of the whole registry for persistence.
    pub fn snapshot(&self) -> Vec<PersistedDevice> {
        self.entries
            .iter()
            .map(|e| PersistedDevice {
                plugin: e.plugin.clone(),
                device: (*e.device).clone(),
            })
            .collect()
    }
}

/// Kernel component owning the shared device registry.
#[derive(Debug, Clone)]
pub struct DeviceManager {
    name: &'static str,
    registry: Arc<Mutex<DeviceRegistry>>,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            name: "DeviceManager",
            registry: Arc::new(Mutex::new(DeviceRegistry::new())),
        }
    }

    /// Shared handle for collaborators that lock the registry directly
    pub fn registry(&self) -> Arc<Mutex<DeviceRegistry>> {
        Arc::clone(&self.registry)
    }

    pub async fn add(&self, plugin: &str, device: Arc<BridgedDevice>) -> Result<()> {
        let mut registry = self.registry.lock().await;
        registry.add(plugin, device)
    }

    pub async fn remove(&self, plugin: &str, unique_id: &str) -> Result<Arc<BridgedDevice>> {
        let mut registry = self.registry.lock().await;
        registry.remove(plugin, unique_id)
    }

    pub async fn remove_all_for_plugin(&self, plugin: &str) -> Vec<Arc<BridgedDevice>> {
        let mut registry = self.registry.lock().await;
        registry.remove_all_for_plugin(plugin)
    }

    pub async fn devices_for_plugin(&self, plugin: &str) -> Vec<Arc<BridgedDevice>> {
        let registry = self.registry.lock().await;
        registry.devices_for_plugin(plugin)
    }

    pub async fn count_for_plugin(&self, plugin: &str) -> usize {
        let registry = self.registry.lock().await;
        registry.count_for_plugin(plugin)
    }

    pub async fn device_count(&self) -> usize {
        let registry = self.registry.lock().await;
        registry.len()
    }

    pub async fn snapshot(&self) -> Vec<PersistedDevice> {
        let registry = self.registry.lock().await;
        registry.snapshot()
    }

    pub async fn clear(&self) {
        let mut registry = self.registry.lock().await;
        registry.clear();
    }

    /// Write the full registry snapshot into the device namespace.
    /// The coordinator calls this during the store-flush phase.
    pub async fn persist_to(&self, context: &StorageContext) -> Result<()> {
        let snapshot = self.snapshot().await;
        context.set(DEVICE_NAMESPACE, &snapshot)
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KernelComponent for DeviceManager {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.clear().await;
        Ok(())
    }
}
