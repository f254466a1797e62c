use serde::{Deserialize, Serialize};

/// Attributes a caller declares when asking for a synthetic identity.
/// Serial number and unique id are deliberately absent: the manager owns
/// those and keeps them stable across restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredIdentity {
    pub device_name: String,
    pub device_type: u32,
    pub vendor_id: u16,
    pub vendor_name: String,
    pub product_id: u16,
    pub product_name: String,
    pub software_version: u32,
    pub software_version_string: String,
    pub hardware_version: u32,
    pub hardware_version_string: String,
}

/// Persisted commissioning identity, keyed by plugin name (or `"root"` for
/// the shared bridge identity).
///
/// Serial number and unique id are generated exactly once and read back on
/// every later run; regenerating either would look like a brand-new device
/// to commissioned controllers and break the pairing. Version fields are
/// refreshed on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissioningIdentity {
    pub device_name: String,
    pub device_type: u32,
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

/// Codes for one open commissioning window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingCodes {
    pub qr_pairing_code: String,
    pub manual_pairing_code: String,
}

/// Fabric summary with key material stripped, safe for the admin surface
/// and the persisted registry snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricSummary {
    pub fabric_index: u8,
    pub fabric_id: u64,
    pub node_id: u64,
    pub root_vendor_id: u16,
    pub label: String,
}

/// Sanitized session summary for the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub name: String,
    pub fabric_index: u8,
    pub peer_node_id: u64,
    pub secure: bool,
    pub active: bool,
}
