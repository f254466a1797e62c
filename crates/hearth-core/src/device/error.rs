use thiserror::Error;

/// Errors specific to the device registry.
#[derive(Debug, Error)]
pub enum DeviceSystemError {
    #[error("Device '{unique_id}' from plugin '{plugin}' is already registered")]
    DuplicateDevice { plugin: String, unique_id: String },

    #[error("Device '{unique_id}' from plugin '{plugin}' is not registered")]
    DeviceNotFound { plugin: String, unique_id: String },
}
