use thiserror::Error;

/// Errors specific to commissioning identities and the protocol engine
/// boundary.
#[derive(Debug, Error)]
pub enum CommissioningError {
    /// The identity store could not be read or written. Unrecoverable:
    /// continuing would risk regenerating a serial number and breaking an
    /// existing pairing, so the caller must trigger a coordinated shutdown.
    #[error("Commissioning identity store unavailable: {message}")]
    PersistenceFatal {
        message: String,
        #[source]
        source: Option<Box<crate::kernel::error::Error>>,
    },

    /// The protocol engine rejected or failed an operation.
    #[error("Protocol engine operation '{operation}' failed: {message}")]
    Engine { operation: String, message: String },

    /// A handle referred to a commissioning server the engine does not know.
    #[error("Unknown commissioning server '{0}'")]
    UnknownServer(String),
}

impl CommissioningError {
    /// Wrap a storage-layer failure as a fatal persistence error.
    pub fn persistence(message: impl Into<String>, source: crate::kernel::error::Error) -> Self {
        CommissioningError::PersistenceFatal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
