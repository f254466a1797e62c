//! Device registry: the set of (plugin, device) pairs currently exposed.
//!
//! Plugins own their devices; the registry only references them. Adds and
//! removes keep the owning plugin's counters consistent (the orchestrator
//! mirrors registry counts into the plugin record), and the whole registry
//! is serialized into the persisted store as the final snapshot during
//! shutdown.

pub mod error;
pub mod registry;
pub mod types;

pub use error::DeviceSystemError;
pub use registry::{DeviceEntry, DeviceManager, DeviceRegistry, PersistedDevice};
pub use types::{BasicInformation, BridgedDevice, ClusterSnapshot};
