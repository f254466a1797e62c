//! Persistent storage for the bridge.
//!
//! Everything the bridge remembers across restarts flows through here: the
//! filesystem [`StorageProvider`] abstraction, typed config documents via
//! [`ConfigManager`], and the namespaced [`StorageContext`] key-value
//! documents that back commissioning identities and the plugin registry
//! snapshot.

pub mod config;
pub mod context;
pub mod error;
pub mod local;
pub mod manager;
pub mod provider;

/// Re-export key types
pub use config::{ConfigData, ConfigFormat, ConfigManager, ConfigScope};
pub use context::StorageContext;
pub use error::StorageSystemError;
pub use local::LocalStorageProvider;
pub use manager::{DefaultStorageManager, StorageManager};
pub use provider::StorageProvider;

// Test module declaration
#[cfg(test)]
mod tests;
