//! Plugin metadata and the registry record tracked per plugin.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::commissioning::identity::{FabricSummary, SessionSummary};
use crate::plugin_system::traits::PluginKind;

/// Static plugin description, as declared in a manifest or seeded for a
/// built-in factory registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    pub kind: PluginKind,
}

impl PluginMetadata {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
        author: impl Into<String>,
        kind: PluginKind,
    ) -> Self {
        PluginMetadata {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            author: author.into(),
            kind,
        }
    }
}

/// Everything the bridge tracks about one registered plugin.
///
/// The flags encode lifecycle progress and obey `configured` implies
/// `started` implies `loaded`. `error` is absorbing for the current run: once
/// set, the plugin makes no further lifecycle progress until the next run.
/// The device counters exist only while the plugin is loaded and are cleared
/// together with the flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRecord {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    pub kind: PluginKind,
    /// Shared library path for dynamically loaded plugins, `None` for
    /// built-ins resolved through the factory table.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub loaded: bool,
    #[serde(default)]
    pub started: bool,
    #[serde(default)]
    pub configured: bool,
    #[serde(default)]
    pub error: bool,
    /// Set exactly once, synchronously, right before the plugin's dedicated
    /// commissioning server is created. Guards against a second creation
    /// racing in between awaits.
    #[serde(default)]
    pub locked: bool,

    /// Commissioned into at least one fabric.
    #[serde(default)]
    pub paired: bool,
    /// Has at least one active controller session.
    #[serde(default)]
    pub connected: bool,

    #[serde(default)]
    pub registered_devices: Option<usize>,
    #[serde(default)]
    pub added_devices: Option<usize>,

    #[serde(default)]
    pub qr_pairing_code: Option<String>,
    #[serde(default)]
    pub manual_pairing_code: Option<String>,
    #[serde(default)]
    pub fabrics: Vec<FabricSummary>,
    #[serde(default)]
    pub sessions: Vec<SessionSummary>,

    /// Newest published version seen by the update poller, if any.
    #[serde(default)]
    pub latest_version: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl PluginRecord {
    pub fn new(metadata: PluginMetadata, path: Option<PathBuf>) -> Self {
        PluginRecord {
            name: metadata.name,
            version: metadata.version,
            description: metadata.description,
            author: metadata.author,
            kind: metadata.kind,
            path,
            enabled: true,
            loaded: false,
            started: false,
            configured: false,
            error: false,
            locked: false,
            paired: false,
            connected: false,
            registered_devices: None,
            added_devices: None,
            qr_pairing_code: None,
            manual_pairing_code: None,
            fabrics: Vec::new(),
            sessions: Vec::new(),
            latest_version: None,
        }
    }

    /// Reset per-run state after restoring a persisted record. Pairing codes
    /// and the last seen published version survive across runs; everything
    /// the lifecycle recomputes does not.
    pub fn restore(&mut self) {
        self.loaded = false;
        self.started = false;
        self.configured = false;
        self.error = false;
        self.locked = false;
        self.paired = false;
        self.connected = false;
        self.registered_devices = None;
        self.added_devices = None;
        self.fabrics = Vec::new();
        self.sessions = Vec::new();
    }

    /// Flag the plugin as loaded and bring its device counters into
    /// existence at zero.
    pub fn mark_loaded(&mut self) {
        self.loaded = true;
        self.registered_devices = Some(0);
        self.added_devices = Some(0);
    }

    pub fn mark_started(&mut self) {
        self.started = true;
    }

    pub fn mark_configured(&mut self) {
        self.configured = true;
    }

    /// Latch the error flag. Never cleared within a run.
    pub fn mark_error(&mut self) {
        self.error = true;
    }

    /// Ready means the startup supervisor no longer waits on this plugin.
    pub fn is_ready(&self) -> bool {
        self.loaded && self.started
    }

    pub fn inc_registered(&mut self) {
        if let Some(count) = self.registered_devices.as_mut() {
            *count += 1;
        }
    }

    pub fn dec_registered(&mut self) {
        if let Some(count) = self.registered_devices.as_mut() {
            *count = count.saturating_sub(1);
        }
    }

    pub fn inc_added(&mut self) {
        if let Some(count) = self.added_devices.as_mut() {
            *count += 1;
        }
    }

    pub fn dec_added(&mut self) {
        if let Some(count) = self.added_devices.as_mut() {
            *count = count.saturating_sub(1);
        }
    }
}
