/// Application name
pub const APP_NAME: &str = "hearth";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Storage directory name under the user's home directory
pub const STORAGE_DIR_NAME: &str = ".hearth";

/// Default plugins directory
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";

/// Context namespace holding commissioning identities
pub const IDENTITY_NAMESPACE: &str = "identities";

/// Context namespace holding the persisted plugin registry snapshot
pub const REGISTRY_NAMESPACE: &str = "plugins";

/// Context namespace holding the serialized device registry
pub const DEVICE_NAMESPACE: &str = "devices";

/// Identity key reserved for the bridge's own root node
pub const ROOT_IDENTITY_KEY: &str = "root";

/// Name of the application-level config document
pub const BRIDGE_CONFIG_NAME: &str = "bridge";

/// Startup supervisor poll interval in milliseconds
pub const STARTUP_POLL_INTERVAL_MS: u64 = 1_000;

/// Startup supervisor attempt bound
pub const STARTUP_MAX_ATTEMPTS: u32 = 30;

/// Settle delay between draining plugins and closing the protocol engine,
/// in milliseconds
pub const PROTOCOL_FLUSH_DELAY_MS: u64 = 500;

/// Settle delay between flushing the store and the final reset action,
/// in milliseconds
pub const STORE_FLUSH_DELAY_MS: u64 = 250;

/// Version-check poller interval in milliseconds
pub const VERSION_POLL_INTERVAL_MS: u64 = 60 * 60 * 1_000;

/// Vendor id stamped on synthetic commissioning identities
pub const BRIDGE_VENDOR_ID: u16 = 0xfff1;

/// Vendor name stamped on synthetic commissioning identities
pub const BRIDGE_VENDOR_NAME: &str = "Hearth";

/// Product id stamped on synthetic commissioning identities
pub const BRIDGE_PRODUCT_ID: u16 = 0x8000;

/// Device type of an aggregator endpoint
pub const AGGREGATOR_DEVICE_TYPE: u32 = 0x000e;
