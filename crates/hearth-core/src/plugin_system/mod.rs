//! # Hearth Core Plugin System
//!
//! Infrastructure for hosting platform plugins: registration, factory
//! resolution, the lifecycle orchestrator and the startup supervisor.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`traits`]**: The [`PlatformPlugin`] contract, the [`PlatformHandle`]
//!   given to each loaded platform, and [`PluginKind`].
//! - **[`types`]**: [`PluginMetadata`] (manifest schema) and [`PluginRecord`]
//!   (the per-plugin flags, counters and pairing state the bridge persists).
//! - **[`registry`]**: Insertion-ordered [`PluginRegistry`] of records plus
//!   live instances.
//! - **[`loader`]**: Built-in factory table and `libloading`-based dynamic
//!   loading behind the platform ABI symbols.
//! - **[`manager`]**: The [`PlatformOrchestrator`] kernel component driving
//!   load/start/configure and the admin-facing plugin operations.
//! - **[`supervisor`]**: Bounded-retry startup supervision gating network
//!   start on plugin readiness.
//! - **[`updates`]**: [`PackageManager`] seam and the periodic version-check
//!   poller.
//! - **[`error`]**: [`PluginSystemError`](error::PluginSystemError).
pub mod error;
pub mod loader;
pub mod manager;
pub mod registry;
pub mod supervisor;
pub mod traits;
pub mod types;
pub mod updates;

pub use loader::{PluginLoader, MANIFEST_FILE, PLATFORM_API_VERSION};
pub use manager::{create_shared_registry, PlatformOrchestrator};
pub use registry::{PluginEntry, PluginRegistry, SharedPluginRegistry};
pub use supervisor::{StartupOutcome, StartupSupervisor};
pub use traits::{
    PlatformError, PlatformFactory, PlatformHandle, PlatformPlugin, PlatformResult, PluginKind,
};
pub use types::{PluginMetadata, PluginRecord};
pub use updates::{NoopPackageManager, PackageManager, UpdateChecker};

#[cfg(test)]
mod tests;
