use thiserror::Error;

/// Errors specific to bridge topology decisions.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// The combination of bridge mode, plugin kind and existing attachments
    /// cannot host this device.
    #[error("Unsupported topology for plugin '{plugin}': {message}")]
    UnsupportedTopology { plugin: String, message: String },

    /// The current bridge mode does not support the operation at all.
    #[error("Operation '{operation}' is not supported in {mode} mode")]
    UnsupportedMode { mode: String, operation: String },

    /// A mode string from configuration or the CLI did not parse.
    #[error("Unknown bridge mode '{0}'")]
    UnknownMode(String),

    #[error("Internal topology error: {0}")]
    Internal(String),
}
