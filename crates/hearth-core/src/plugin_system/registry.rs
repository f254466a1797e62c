//! In-memory plugin registry.
//!
//! Holds one [`PluginEntry`] per registered plugin in registration order, so
//! startup, persistence and admin listings all see the same deterministic
//! sequence. The registry itself is synchronous; the orchestrator wraps it in
//! an async mutex and is responsible for holding the lock across any check
//! that must not race a concurrent lifecycle step.

use std::fmt;
use std::sync::Arc;

use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::traits::{PlatformHandle, PlatformPlugin};
use crate::plugin_system::types::PluginRecord;

/// Registry handle shared between the orchestrator, the topology manager and
/// the startup supervisor.
pub type SharedPluginRegistry = Arc<tokio::sync::Mutex<PluginRegistry>>;

/// A registered plugin: its record plus, once loaded, the live platform
/// instance and the handle it was given.
pub struct PluginEntry {
    pub record: PluginRecord,
    pub platform: Option<Arc<dyn PlatformPlugin>>,
    pub handle: Option<Arc<PlatformHandle>>,
}

impl PluginEntry {
    pub fn new(record: PluginRecord) -> Self {
        PluginEntry {
            record,
            platform: None,
            handle: None,
        }
    }
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEntry")
            .field("record", &self.record)
            .field("platform", &self.platform.as_ref().map(|p| p.name()))
            .finish()
    }
}

/// Registry of plugins known to the bridge.
pub struct PluginRegistry {
    entries: Vec<PluginEntry>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        PluginRegistry {
            entries: Vec::new(),
        }
    }

    /// Register a plugin record. Fails if the name is already taken.
    pub fn register(&mut self, record: PluginRecord) -> Result<(), PluginSystemError> {
        if self.get(&record.name).is_some() {
            return Err(PluginSystemError::AlreadyRegistered {
                plugin: record.name.clone(),
            });
        }
        self.entries.push(PluginEntry::new(record));
        Ok(())
    }

    /// Remove a plugin and return its entry.
    pub fn unregister(&mut self, name: &str) -> Result<PluginEntry, PluginSystemError> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.record.name == name)
            .ok_or_else(|| PluginSystemError::NotRegistered {
                plugin: name.to_string(),
            })?;
        Ok(self.entries.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&PluginEntry> {
        self.entries.iter().find(|entry| entry.record.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PluginEntry> {
        self.entries
            .iter_mut()
            .find(|entry| entry.record.name == name)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Live platform instance for a loaded plugin.
    pub fn platform(&self, name: &str) -> Option<Arc<dyn PlatformPlugin>> {
        self.get(name).and_then(|entry| entry.platform.clone())
    }

    /// Context handle for a loaded plugin.
    pub fn handle(&self, name: &str) -> Option<Arc<PlatformHandle>> {
        self.get(name).and_then(|entry| entry.handle.clone())
    }

    /// Attach the live instance and handle produced by a successful load.
    pub fn set_platform(
        &mut self,
        name: &str,
        platform: Arc<dyn PlatformPlugin>,
        handle: Arc<PlatformHandle>,
    ) -> Result<(), PluginSystemError> {
        let entry = self
            .get_mut(name)
            .ok_or_else(|| PluginSystemError::NotRegistered {
                plugin: name.to_string(),
            })?;
        entry.platform = Some(platform);
        entry.handle = Some(handle);
        Ok(())
    }

    /// Drop the live instance and handle, keeping the record.
    pub fn clear_platform(&mut self, name: &str) {
        if let Some(entry) = self.get_mut(name) {
            entry.platform = None;
            entry.handle = None;
        }
    }

    /// Plugin names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.record.name.clone())
            .collect()
    }

    pub fn entries(&self) -> &[PluginEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of every record, in registration order, for persistence.
    pub fn records(&self) -> Vec<PluginRecord> {
        self.entries
            .iter()
            .map(|entry| entry.record.clone())
            .collect()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replace the registry contents with persisted records. Per-run state in
    /// each record is reset; live instances do not survive restoration.
    pub fn load_snapshot(&mut self, records: Vec<PluginRecord>) {
        self.entries = records
            .into_iter()
            .map(|mut record| {
                record.restore();
                PluginEntry::new(record)
            })
            .collect();
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("entries", &self.entries)
            .finish()
    }
}
