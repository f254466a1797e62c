use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::device::types::ClusterSnapshot;
use crate::plugin_system::types::PluginRecord;
use crate::storage::config::ConfigData;
use crate::topology::manager::BridgeMode;

/// The closed set of mutating admin verbs.
///
/// Frontends (CLI subcommands, the out-of-tree HTTP/WS layer) build one of
/// these and hand it to [`AdminHandler::execute`]. The serde tag carries the
/// wire verb name, so `{"command": "addplugin", "path": "..."}` round-trips.
///
/// [`AdminHandler::execute`]: crate::admin::handler::AdminHandler::execute
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum AdminCommand {
    AddPlugin { path: PathBuf },
    RemovePlugin { name: String },
    EnablePlugin { name: String },
    DisablePlugin { name: String },
    SaveConfig { name: String, config: ConfigData },
    InstallPlugin {
        name: String,
        #[serde(default)]
        version: Option<String>,
    },
    Shutdown {
        #[serde(default)]
        reason: Option<String>,
    },
    Restart {
        #[serde(default)]
        reason: Option<String>,
    },
    Update {
        #[serde(default)]
        reason: Option<String>,
    },
    /// Wipe the commissioning identity store, then shut down.
    Reset,
    /// Wipe the whole persisted store, then shut down.
    FactoryReset,
    /// Detach every bridged device from every plugin, then shut down.
    Unregister,
}

impl AdminCommand {
    /// Wire verb, for log lines
    pub fn verb(&self) -> &'static str {
        match self {
            AdminCommand::AddPlugin { .. } => "addplugin",
            AdminCommand::RemovePlugin { .. } => "removeplugin",
            AdminCommand::EnablePlugin { .. } => "enableplugin",
            AdminCommand::DisablePlugin { .. } => "disableplugin",
            AdminCommand::SaveConfig { .. } => "saveconfig",
            AdminCommand::InstallPlugin { .. } => "installplugin",
            AdminCommand::Shutdown { .. } => "shutdown",
            AdminCommand::Restart { .. } => "restart",
            AdminCommand::Update { .. } => "update",
            AdminCommand::Reset => "reset",
            AdminCommand::FactoryReset => "factoryreset",
            AdminCommand::Unregister => "unregister",
        }
    }
}

/// Read-only admin queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "lowercase")]
pub enum AdminQuery {
    Settings,
    Plugins,
    Devices,
    DeviceClusters { plugin: String, unique_id: String },
}

impl AdminQuery {
    pub fn name(&self) -> &'static str {
        match self {
            AdminQuery::Settings => "settings",
            AdminQuery::Plugins => "plugins",
            AdminQuery::Devices => "devices",
            AdminQuery::DeviceClusters { .. } => "deviceclusters",
        }
    }
}

/// Bridge-level read model served for the `settings` query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    pub name: String,
    pub version: String,
    pub mode: BridgeMode,
    pub started: bool,
    pub qr_pairing_code: Option<String>,
    pub manual_pairing_code: Option<String>,
    pub paired: bool,
    pub connected: bool,
    pub plugin_count: usize,
    pub device_count: usize,
}

/// One row of the `devices` query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub plugin: String,
    pub name: String,
    pub device_type: u32,
    pub unique_id: String,
    pub serial_number: String,
    pub vendor_name: String,
    pub product_name: String,
    pub cluster_count: usize,
}

/// Payload returned by [`execute`]/[`query`].
///
/// [`execute`]: crate::admin::handler::AdminHandler::execute
/// [`query`]: crate::admin::handler::AdminHandler::query
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum AdminResponse {
    /// The command completed; no payload.
    Ack,
    Settings(SettingsSnapshot),
    Plugins(Vec<PluginRecord>),
    Devices(Vec<DeviceSummary>),
    DeviceClusters(Vec<ClusterSnapshot>),
}
