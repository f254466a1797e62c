use serde::{Deserialize, Serialize};

/// Identity block a bridged device exposes on the commissioning network.
///
/// `serial_number` and `unique_id` come from the commissioning identity
/// store when the device represents a whole plugin, or from the foreign
/// ecosystem when the plugin bridges real hardware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicInformation {
    pub vendor_id: u16,
    pub vendor_name: String,
    pub product_id: u16,
    pub product_name: String,
    pub serial_number: String,
    pub unique_id: String,
    pub software_version: u32,
    pub software_version_string: String,
    pub hardware_version: u32,
    pub hardware_version_string: String,
}

/// Read-model snapshot of one cluster's attributes, served to the admin
/// surface. The protocol engine owns the live cluster state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub cluster_id: u32,
    pub cluster_name: String,
    pub attributes: serde_json::Value,
}

/// One exposed accessory, constructed by the owning plugin.
///
/// The registry and topology layers treat this as an opaque handle; only
/// `name`, `device_type` and the identity block matter to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgedDevice {
    pub name: String,
    pub device_type: u32,
    pub basic_information: BasicInformation,
    #[serde(default)]
    pub clusters: Vec<ClusterSnapshot>,
}

impl BridgedDevice {
    pub fn new(name: impl Into<String>, device_type: u32, basic_information: BasicInformation) -> Self {
        Self {
            name: name.into(),
            device_type,
            basic_information,
            clusters: Vec::new(),
        }
    }

    /// Attach cluster snapshots for the admin read model.
    pub fn with_clusters(mut self, clusters: Vec<ClusterSnapshot>) -> Self {
        self.clusters = clusters;
        self
    }

    /// The stable id the registry dedupes on
    pub fn unique_id(&self) -> &str {
        &self.basic_information.unique_id
    }
}
