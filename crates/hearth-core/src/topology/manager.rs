//! # Hearth Core Bridge Topology
//!
//! Decides where a registered device lands on the commissioning fabric.
//!
//! The bridge runs in one of three modes, fixed for the lifetime of a run.
//! In `Bridge` mode every device from every plugin hangs off one shared
//! root server/aggregator pair with a single identity. In `ChildBridge`
//! mode each plugin gets its own commissionable server: dynamic platforms an
//! aggregator for any number of devices, accessory platforms a standalone
//! server whose sole endpoint is the device itself. `Controller` mode hosts
//! no devices at all.
//!
//! Servers and aggregators materialize lazily on the first device that
//! needs them and are reused for the rest of the run, even after all their
//! devices are removed. All topology operations serialize on one internal
//! lock; the lock flags (`root_locked`, the per-plugin `locked` record
//! flag) are set synchronously before the first suspending step of a
//! materialization so a half-created server is never observable as absent.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::commissioning::engine::{EndpointId, ProtocolEngine, ServerHandle};
use crate::commissioning::identity::{DeclaredIdentity, PairingCodes};
use crate::commissioning::manager::CommissioningManager;
use crate::device::registry::DeviceManager;
use crate::device::types::BridgedDevice;
use crate::kernel::component::KernelComponent;
use crate::kernel::constants::{
    AGGREGATOR_DEVICE_TYPE, APP_NAME, APP_VERSION, BRIDGE_PRODUCT_ID, BRIDGE_VENDOR_ID,
    BRIDGE_VENDOR_NAME, ROOT_IDENTITY_KEY,
};
use crate::kernel::error::Result;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::manager::persist_registry_records;
use crate::plugin_system::registry::SharedPluginRegistry;
use crate::plugin_system::traits::PluginKind;
use crate::storage::manager::DefaultStorageManager;
use crate::topology::error::TopologyError;

/// How the bridge presents itself to controllers. Fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeMode {
    Bridge,
    ChildBridge,
    Controller,
}

impl BridgeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeMode::Bridge => "bridge",
            BridgeMode::ChildBridge => "childbridge",
            BridgeMode::Controller => "controller",
        }
    }
}

impl fmt::Display for BridgeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BridgeMode {
    type Err = TopologyError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "bridge" => Ok(BridgeMode::Bridge),
            "childbridge" => Ok(BridgeMode::ChildBridge),
            "controller" => Ok(BridgeMode::Controller),
            _ => Err(TopologyError::UnknownMode(value.to_string())),
        }
    }
}

/// A device's place on the fabric, remembered for detach.
#[derive(Debug, Clone)]
struct Attachment {
    server: ServerHandle,
    endpoint: EndpointId,
}

/// The shared server/aggregator pair of bridge mode.
#[derive(Debug, Clone)]
struct RootResources {
    server: ServerHandle,
    aggregator: EndpointId,
}

/// A plugin's dedicated server in childbridge mode. Accessory platforms
/// have no aggregator.
#[derive(Debug, Clone)]
struct PluginResources {
    server: ServerHandle,
    aggregator: Option<EndpointId>,
}

#[derive(Debug, Default)]
struct TopologyState {
    root_locked: bool,
    root: Option<RootResources>,
    plugins: HashMap<String, PluginResources>,
    attachments: HashMap<(String, String), Attachment>,
    started: bool,
    root_codes: Option<PairingCodes>,
    root_paired: bool,
    root_connected: bool,
}

/// Read model of the bridge-level commissioning state for the admin
/// surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySummary {
    pub mode: BridgeMode,
    pub started: bool,
    pub root_materialized: bool,
    pub qr_pairing_code: Option<String>,
    pub manual_pairing_code: Option<String>,
    pub paired: bool,
    pub connected: bool,
}

/// Places devices on servers according to the bridge mode and plugin kind.
pub struct TopologyManager {
    name: &'static str,
    mode: BridgeMode,
    engine: Arc<dyn ProtocolEngine>,
    commissioning: Arc<CommissioningManager>,
    devices: DeviceManager,
    registry: SharedPluginRegistry,
    storage: Arc<DefaultStorageManager>,
    state: Mutex<TopologyState>,
}

impl TopologyManager {
    pub fn new(
        mode: BridgeMode,
        engine: Arc<dyn ProtocolEngine>,
        commissioning: Arc<CommissioningManager>,
        devices: DeviceManager,
        registry: SharedPluginRegistry,
        storage: Arc<DefaultStorageManager>,
    ) -> Self {
        TopologyManager {
            name: "TopologyManager",
            mode,
            engine,
            commissioning,
            devices,
            registry,
            storage,
            state: Mutex::new(TopologyState::default()),
        }
    }

    pub fn mode(&self) -> BridgeMode {
        self.mode
    }

    pub fn engine(&self) -> &Arc<dyn ProtocolEngine> {
        &self.engine
    }

    /// Place a device. The plugin's kind decides the attachment policy in
    /// childbridge mode; in bridge mode everything shares the root pair.
    pub async fn add_device(&self, plugin: &str, device: Arc<BridgedDevice>) -> Result<()> {
        let mut state = self.state.lock().await;
        match self.mode {
            BridgeMode::Controller => Err(TopologyError::UnsupportedMode {
                mode: self.mode.to_string(),
                operation: "add_device".to_string(),
            }
            .into()),
            BridgeMode::Bridge => {
                let (server, aggregator) = self.materialize_root(&mut state).await?;
                self.attach(&mut state, plugin, device, server, Some(aggregator))
                    .await
            }
            BridgeMode::ChildBridge => match self.plugin_kind(plugin).await? {
                PluginKind::DynamicPlatform => {
                    let (server, aggregator) = self.materialize_dynamic(&mut state, plugin).await?;
                    self.attach(&mut state, plugin, device, server, Some(aggregator))
                        .await
                }
                PluginKind::AccessoryPlatform => {
                    let occupied = state
                        .attachments
                        .keys()
                        .any(|(owner, _)| owner == plugin);
                    if occupied {
                        return Err(TopologyError::UnsupportedTopology {
                            plugin: plugin.to_string(),
                            message: "accessory platform already exposes its device".to_string(),
                        }
                        .into());
                    }
                    let server = self.materialize_accessory(&mut state, plugin, &device).await?;
                    self.attach(&mut state, plugin, device, server, None).await
                }
            },
        }
    }

    /// Detach and drop one device: unreachable, detach, counters, registry.
    pub async fn remove_device(&self, plugin: &str, unique_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let key = (plugin.to_string(), unique_id.to_string());
        let attachment = state.attachments.get(&key).cloned().ok_or_else(|| {
            crate::device::error::DeviceSystemError::DeviceNotFound {
                plugin: plugin.to_string(),
                unique_id: unique_id.to_string(),
            }
        })?;

        if let Err(e) = self
            .engine
            .set_reachability(&attachment.server, attachment.endpoint, false)
            .await
        {
            log::warn!(
                "Failed to mark device '{}' unreachable: {}",
                unique_id,
                e
            );
        }
        self.engine
            .detach(&attachment.server, attachment.endpoint)
            .await?;
        state.attachments.remove(&key);
        self.devices.remove(plugin, unique_id).await?;

        {
            let mut registry = self.registry.lock().await;
            if let Some(entry) = registry.get_mut(plugin) {
                entry.record.dec_registered();
                entry.record.dec_added();
            }
        }
        log::debug!("Removed device '{}' of plugin '{}'", unique_id, plugin);
        Ok(())
    }

    /// Cascade-remove every device of a plugin. Its server and aggregator
    /// stay materialized for reuse later in the run. Returns how many
    /// devices were removed.
    pub async fn remove_all_for_plugin(&self, plugin: &str) -> Result<usize> {
        let mut state = self.state.lock().await;
        let keys: Vec<(String, String)> = state
            .attachments
            .keys()
            .filter(|(owner, _)| owner == plugin)
            .cloned()
            .collect();

        for key in &keys {
            let Some(attachment) = state.attachments.remove(key) else {
                continue;
            };
            if let Err(e) = self
                .engine
                .set_reachability(&attachment.server, attachment.endpoint, false)
                .await
            {
                log::warn!("Failed to mark device '{}' unreachable: {}", key.1, e);
            }
            if let Err(e) = self
                .engine
                .detach(&attachment.server, attachment.endpoint)
                .await
            {
                log::warn!("Failed to detach device '{}': {}", key.1, e);
            }
        }

        let removed = self.devices.remove_all_for_plugin(plugin).await.len();
        if removed > 0 {
            let mut registry = self.registry.lock().await;
            if let Some(entry) = registry.get_mut(plugin) {
                for _ in 0..removed {
                    entry.record.dec_registered();
                    entry.record.dec_added();
                }
            }
            log::debug!("Removed {} device(s) of plugin '{}'", removed, plugin);
        }
        Ok(removed)
    }

    /// The network startup step: open every materialized server for
    /// commissioning traffic and pull pairing state into the records.
    /// Idempotent; later materializations start themselves.
    pub async fn start_servers(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if state.started {
                log::debug!("Servers already started");
                return Ok(());
            }
            let servers: Vec<ServerHandle> = state
                .root
                .iter()
                .map(|root| root.server.clone())
                .chain(state.plugins.values().map(|res| res.server.clone()))
                .collect();
            for server in &servers {
                self.engine.start_server(server).await?;
            }
            state.started = true;
            log::info!("Started {} commissioning server(s)", servers.len());
        }
        self.refresh_commissioning_state().await?;
        self.persist_records().await
    }

    /// Re-read pairing codes, fabrics and sessions from the engine into the
    /// plugin records and the root summary.
    pub async fn refresh_commissioning_state(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        if let Some(root) = state.root.clone() {
            state.root_codes = self.engine.pairing_codes(&root.server).await?;
            let fabrics = self.engine.fabrics(&root.server).await?;
            let sessions = self.engine.sessions(&root.server).await?;
            state.root_paired = !fabrics.is_empty();
            state.root_connected = sessions.iter().any(|s| s.active);
        }

        let plugin_servers: Vec<(String, ServerHandle)> = state
            .plugins
            .iter()
            .map(|(name, res)| (name.clone(), res.server.clone()))
            .collect();
        for (name, server) in plugin_servers {
            let codes = self.engine.pairing_codes(&server).await?;
            let fabrics = self.engine.fabrics(&server).await?;
            let sessions = self.engine.sessions(&server).await?;
            let mut registry = self.registry.lock().await;
            if let Some(entry) = registry.get_mut(&name) {
                entry.record.qr_pairing_code = codes.as_ref().map(|c| c.qr_pairing_code.clone());
                entry.record.manual_pairing_code =
                    codes.as_ref().map(|c| c.manual_pairing_code.clone());
                entry.record.paired = !fabrics.is_empty();
                entry.record.connected = sessions.iter().any(|s| s.active);
                entry.record.fabrics = fabrics;
                entry.record.sessions = sessions;
            }
        }
        Ok(())
    }

    /// Bridge-level commissioning state for the admin surface.
    pub async fn summary(&self) -> TopologySummary {
        let state = self.state.lock().await;
        TopologySummary {
            mode: self.mode,
            started: state.started,
            root_materialized: state.root.is_some(),
            qr_pairing_code: state
                .root_codes
                .as_ref()
                .map(|c| c.qr_pairing_code.clone()),
            manual_pairing_code: state
                .root_codes
                .as_ref()
                .map(|c| c.manual_pairing_code.clone()),
            paired: state.root_paired,
            connected: state.root_connected,
        }
    }

    async fn plugin_kind(&self, plugin: &str) -> Result<PluginKind> {
        let registry = self.registry.lock().await;
        let entry = registry
            .get(plugin)
            .ok_or_else(|| PluginSystemError::NotRegistered {
                plugin: plugin.to_string(),
            })?;
        Ok(entry.record.kind)
    }

    async fn materialize_root(
        &self,
        state: &mut TopologyState,
    ) -> Result<(ServerHandle, EndpointId)> {
        if let Some(root) = &state.root {
            return Ok((root.server.clone(), root.aggregator));
        }
        // Flag first, before any suspending step of the creation.
        state.root_locked = true;
        match self.create_root_resources(state.started).await {
            Ok(root) => {
                let result = (root.server.clone(), root.aggregator);
                state.root = Some(root);
                log::info!("Materialized shared bridge server");
                Ok(result)
            }
            Err(e) => {
                // Creation never happened; allow a later retry.
                state.root_locked = false;
                Err(e)
            }
        }
    }

    async fn create_root_resources(&self, start_now: bool) -> Result<RootResources> {
        let declared = root_identity();
        let identity = self.commissioning.create(ROOT_IDENTITY_KEY, &declared)?;
        let server = self.engine.create_server(ROOT_IDENTITY_KEY, &identity).await?;
        let aggregator = self.engine.create_aggregator(&server, APP_NAME).await?;
        if start_now {
            self.engine.start_server(&server).await?;
        }
        Ok(RootResources { server, aggregator })
    }

    async fn materialize_dynamic(
        &self,
        state: &mut TopologyState,
        plugin: &str,
    ) -> Result<(ServerHandle, EndpointId)> {
        if let Some(resources) = state.plugins.get(plugin) {
            let aggregator = resources.aggregator.ok_or_else(|| {
                TopologyError::Internal(format!(
                    "dynamic platform '{plugin}' has a server but no aggregator"
                ))
            })?;
            return Ok((resources.server.clone(), aggregator));
        }

        // Lock flag set synchronously, before the creation's first await.
        let version = {
            let mut registry = self.registry.lock().await;
            let entry = registry
                .get_mut(plugin)
                .ok_or_else(|| PluginSystemError::NotRegistered {
                    plugin: plugin.to_string(),
                })?;
            entry.record.locked = true;
            entry.record.version.clone()
        };

        match self
            .create_dynamic_resources(plugin, &version, state.started)
            .await
        {
            Ok(resources) => {
                let server = resources.server.clone();
                let aggregator = resources.aggregator.ok_or_else(|| {
                    TopologyError::Internal(format!(
                        "dynamic platform '{plugin}' has a server but no aggregator"
                    ))
                })?;
                state.plugins.insert(plugin.to_string(), resources);
                log::info!("Materialized dedicated server for plugin '{}'", plugin);
                Ok((server, aggregator))
            }
            Err(e) => {
                self.release_lock_flag(plugin).await;
                Err(e)
            }
        }
    }

    async fn create_dynamic_resources(
        &self,
        plugin: &str,
        version: &str,
        start_now: bool,
    ) -> Result<PluginResources> {
        let declared = plugin_identity(plugin, version);
        let identity = self.commissioning.create(plugin, &declared)?;
        let server = self.engine.create_server(plugin, &identity).await?;
        let aggregator = self.engine.create_aggregator(&server, plugin).await?;
        if start_now {
            self.engine.start_server(&server).await?;
        }
        Ok(PluginResources {
            server,
            aggregator: Some(aggregator),
        })
    }

    async fn materialize_accessory(
        &self,
        state: &mut TopologyState,
        plugin: &str,
        device: &BridgedDevice,
    ) -> Result<ServerHandle> {
        if let Some(resources) = state.plugins.get(plugin) {
            return Ok(resources.server.clone());
        }

        {
            let mut registry = self.registry.lock().await;
            let entry = registry
                .get_mut(plugin)
                .ok_or_else(|| PluginSystemError::NotRegistered {
                    plugin: plugin.to_string(),
                })?;
            entry.record.locked = true;
        }

        match self.create_accessory_resources(plugin, device, state.started).await {
            Ok(resources) => {
                let server = resources.server.clone();
                state.plugins.insert(plugin.to_string(), resources);
                log::info!(
                    "Materialized standalone server for accessory plugin '{}'",
                    plugin
                );
                Ok(server)
            }
            Err(e) => {
                self.release_lock_flag(plugin).await;
                Err(e)
            }
        }
    }

    async fn create_accessory_resources(
        &self,
        plugin: &str,
        device: &BridgedDevice,
        start_now: bool,
    ) -> Result<PluginResources> {
        let identity = self.commissioning.import(
            plugin,
            &device.name,
            device.device_type,
            &device.basic_information,
        )?;
        let server = self.engine.create_server(plugin, &identity).await?;
        if start_now {
            self.engine.start_server(&server).await?;
        }
        Ok(PluginResources {
            server,
            aggregator: None,
        })
    }

    async fn release_lock_flag(&self, plugin: &str) {
        let mut registry = self.registry.lock().await;
        if let Some(entry) = registry.get_mut(plugin) {
            entry.record.locked = false;
        }
    }

    /// Register the device, attach it, and only then move the counters.
    async fn attach(
        &self,
        state: &mut TopologyState,
        plugin: &str,
        device: Arc<BridgedDevice>,
        server: ServerHandle,
        aggregator: Option<EndpointId>,
    ) -> Result<()> {
        let unique_id = device.unique_id().to_string();
        self.devices.add(plugin, device.clone()).await?;

        let attach_result = match aggregator {
            Some(aggregator) => {
                self.engine
                    .attach_to_aggregator(&server, aggregator, &device)
                    .await
            }
            None => self.engine.attach_standalone(&server, &device).await,
        };
        let endpoint = match attach_result {
            Ok(endpoint) => endpoint,
            Err(e) => {
                if let Err(rollback) = self.devices.remove(plugin, &unique_id).await {
                    log::warn!(
                        "Failed to roll back device '{}' after attach failure: {}",
                        unique_id,
                        rollback
                    );
                }
                return Err(e);
            }
        };

        state.attachments.insert(
            (plugin.to_string(), unique_id.clone()),
            Attachment { server, endpoint },
        );
        {
            let mut registry = self.registry.lock().await;
            if let Some(entry) = registry.get_mut(plugin) {
                entry.record.inc_registered();
                entry.record.inc_added();
            }
        }
        log::debug!(
            "Attached device '{}' of plugin '{}' at endpoint {}",
            device.name,
            plugin,
            endpoint.0
        );
        Ok(())
    }

    async fn persist_records(&self) -> Result<()> {
        let records = {
            let registry = self.registry.lock().await;
            registry.records()
        };
        persist_registry_records(&self.storage, &records)
    }
}

impl fmt::Debug for TopologyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopologyManager")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KernelComponent for TopologyManager {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn initialize(&self) -> Result<()> {
        log::debug!("Topology manager running in {} mode", self.mode);
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        // Server start is driven explicitly once the supervisor clears it.
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.attachments.clear();
        state.plugins.clear();
        state.root = None;
        state.root_locked = false;
        state.started = false;
        Ok(())
    }
}

/// The shared bridge identity of bridge mode.
fn root_identity() -> DeclaredIdentity {
    DeclaredIdentity {
        device_name: BRIDGE_VENDOR_NAME.to_string(),
        device_type: AGGREGATOR_DEVICE_TYPE,
        vendor_id: BRIDGE_VENDOR_ID,
        vendor_name: BRIDGE_VENDOR_NAME.to_string(),
        product_id: BRIDGE_PRODUCT_ID,
        product_name: APP_NAME.to_string(),
        software_version: numeric_version(APP_VERSION),
        software_version_string: APP_VERSION.to_string(),
        hardware_version: 1,
        hardware_version_string: "1".to_string(),
    }
}

/// The dedicated identity of a dynamic platform in childbridge mode.
fn plugin_identity(plugin: &str, version: &str) -> DeclaredIdentity {
    DeclaredIdentity {
        device_name: plugin.to_string(),
        device_type: AGGREGATOR_DEVICE_TYPE,
        vendor_id: BRIDGE_VENDOR_ID,
        vendor_name: BRIDGE_VENDOR_NAME.to_string(),
        product_id: BRIDGE_PRODUCT_ID,
        product_name: plugin.to_string(),
        software_version: numeric_version(version),
        software_version_string: version.to_string(),
        hardware_version: 1,
        hardware_version_string: "1".to_string(),
    }
}

/// Collapse a semver string into the numeric software version field.
fn numeric_version(version: &str) -> u32 {
    match semver::Version::parse(version) {
        Ok(v) => (v.major as u32) * 10_000 + (v.minor as u32) * 100 + (v.patch as u32),
        Err(_) => 0,
    }
}
