//! # Hearth Core Plugin Traits
//!
//! Defines the contract between the bridge and its platform plugins.
//!
//! A platform plugin implements [`PlatformPlugin`] and is driven through a
//! fixed lifecycle: `on_load` hands it a [`PlatformHandle`], `on_start` lets
//! it discover and register devices, `on_configure` runs once the protocol
//! side is up, and `on_shutdown` gives it a chance to release resources.
//! The handle is the only channel back into the bridge; plugins never touch
//! the registries directly.

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::types::BridgedDevice;
use crate::storage::config::{ConfigData, CONFIG_KEY_DEBUG};
use crate::topology::manager::TopologyManager;

/// How a plugin surfaces its devices to controllers.
///
/// The kind is fixed at registration time and drives the topology policy:
/// accessory platforms expose each device as its own commissionable server,
/// dynamic platforms hang any number of devices off an aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginKind {
    AccessoryPlatform,
    DynamicPlatform,
}

impl PluginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::AccessoryPlatform => "AccessoryPlatform",
            PluginKind::DynamicPlatform => "DynamicPlatform",
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type plugins report back across the lifecycle hooks.
///
/// A plain message, deliberately free of host-side types so that dynamically
/// loaded plugins do not need the host's error enums in their ABI.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct PlatformError(pub String);

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        PlatformError(message.into())
    }
}

impl From<&str> for PlatformError {
    fn from(message: &str) -> Self {
        PlatformError(message.to_string())
    }
}

impl From<String> for PlatformError {
    fn from(message: String) -> Self {
        PlatformError(message)
    }
}

/// Result type for plugin lifecycle hooks.
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Log target scoping a plugin's output, `hearth::plugin::<name>`.
pub fn plugin_log_target(plugin_name: &str) -> String {
    format!("hearth::plugin::{plugin_name}")
}

/// Per-plugin context handed to a platform in `on_load`.
///
/// Owns the plugin's working copy of its config and proxies device
/// registration to the topology manager under the plugin's own name, so a
/// platform can only ever touch its own devices.
pub struct PlatformHandle {
    plugin_name: String,
    kind: PluginKind,
    log_target: String,
    config: StdMutex<ConfigData>,
    topology: Arc<TopologyManager>,
}

impl PlatformHandle {
    pub fn new(
        plugin_name: impl Into<String>,
        kind: PluginKind,
        config: ConfigData,
        topology: Arc<TopologyManager>,
    ) -> Self {
        let plugin_name = plugin_name.into();
        let log_target = plugin_log_target(&plugin_name);
        PlatformHandle {
            plugin_name,
            kind,
            log_target,
            config: StdMutex::new(config),
            topology,
        }
    }

    pub fn name(&self) -> &str {
        &self.plugin_name
    }

    pub fn kind(&self) -> PluginKind {
        self.kind
    }

    /// Log target scoped to this plugin, `hearth::plugin::<name>`.
    pub fn log_target(&self) -> &str {
        &self.log_target
    }

    /// Whether the plugin's config asks for debug logging.
    pub fn debug_enabled(&self) -> bool {
        self.with_config(|config| config.get_or(CONFIG_KEY_DEBUG, false))
    }

    /// Snapshot of the plugin's current in-memory config.
    pub fn config_snapshot(&self) -> ConfigData {
        self.with_config(|config| config.clone())
    }

    /// Read a single typed value from the plugin's config.
    pub fn config_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.with_config(|config| config.get(key))
    }

    /// Update a single value in the plugin's in-memory config. The change is
    /// not persisted until the config is explicitly saved.
    pub fn set_config_value<T: Serialize>(&self, key: &str, value: T) -> PlatformResult<()> {
        self.with_config_mut(|config| {
            config
                .set(key, value)
                .map_err(|e| PlatformError(e.to_string()))
        })
    }

    /// Swap the whole working copy, as after an admin config save.
    pub fn replace_config(&self, config: ConfigData) {
        self.with_config_mut(|current| {
            *current = config;
        });
    }

    fn with_config<R>(&self, f: impl FnOnce(&ConfigData) -> R) -> R {
        match self.config.lock() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn with_config_mut<R>(&self, f: impl FnOnce(&mut ConfigData) -> R) -> R {
        match self.config.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Register a device under this plugin's name. The topology manager
    /// decides where it lands based on the bridge mode and the plugin kind.
    pub async fn register_device(&self, device: BridgedDevice) -> PlatformResult<()> {
        self.topology
            .add_device(&self.plugin_name, Arc::new(device))
            .await
            .map_err(|e| PlatformError(e.to_string()))
    }

    /// Remove one of this plugin's devices by its unique id.
    pub async fn unregister_device(&self, unique_id: &str) -> PlatformResult<()> {
        self.topology
            .remove_device(&self.plugin_name, unique_id)
            .await
            .map_err(|e| PlatformError(e.to_string()))
    }

    /// Remove every device this plugin has registered.
    pub async fn unregister_all(&self) -> PlatformResult<usize> {
        self.topology
            .remove_all_for_plugin(&self.plugin_name)
            .await
            .map_err(|e| PlatformError(e.to_string()))
    }
}

impl fmt::Debug for PlatformHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformHandle")
            .field("plugin_name", &self.plugin_name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// The lifecycle contract a platform plugin implements.
///
/// Hooks are invoked in a fixed order and each at most once per bridge run:
/// `on_load` then `on_start` then `on_configure`, with `on_shutdown` closing
/// the run. A hook returning an error marks the plugin failed and stops its
/// progression; the bridge itself keeps running.
#[async_trait]
pub trait PlatformPlugin: Send + Sync {
    /// Stable plugin name. Must match the registered name.
    fn name(&self) -> &'static str;

    /// Plugin version, a semver string.
    fn version(&self) -> &'static str;

    /// Which topology policy this plugin's devices follow.
    fn kind(&self) -> PluginKind;

    /// Called once after instantiation with the plugin's context handle.
    async fn on_load(&self, handle: Arc<PlatformHandle>) -> PlatformResult<()>;

    /// Called once per run to discover and register devices. `reason` is set
    /// when the start is part of a restart or update cycle.
    async fn on_start(&self, reason: Option<&str>) -> PlatformResult<()>;

    /// Called once after the protocol servers are up.
    async fn on_configure(&self) -> PlatformResult<()>;

    /// Called during coordinated shutdown. `reason` names the trigger.
    async fn on_shutdown(&self, reason: Option<&str>) -> PlatformResult<()>;
}

/// Constructor held in the built-in factory table. A shared closure rather
/// than a fn pointer so embedders can capture configuration in it.
pub type PlatformFactory = Arc<dyn Fn() -> Arc<dyn PlatformPlugin> + Send + Sync>;
