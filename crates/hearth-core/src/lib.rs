//! Core of the hearth commissioning bridge: plugin lifecycle, device and
//! topology management, persisted commissioning identities, and the
//! coordinated shutdown machinery. The `hearth` binary and the platform
//! plugins build on this crate.

pub mod admin;
pub mod commissioning;
pub mod device;
pub mod event;
pub mod kernel;
pub mod plugin_system;
pub mod shutdown;
pub mod storage;
pub mod topology;

// Re-export the types the binary and platform plugins reach for most.
pub use admin::{AdminCommand, AdminHandler, AdminQuery, AdminResponse};
pub use device::types::{BasicInformation, BridgedDevice, ClusterSnapshot};
pub use kernel::error::{Error, Result};
pub use kernel::{Hearth, HearthConfig, RunOutcome};
pub use plugin_system::{
    PlatformError, PlatformHandle, PlatformPlugin, PlatformResult, PluginKind, PluginMetadata,
};
pub use topology::BridgeMode;
