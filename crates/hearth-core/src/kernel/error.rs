//! # Hearth Core Kernel Errors
//!
//! Defines the top-level [`Error`] enum aggregating every subsystem's typed
//! error, plus [`KernelLifecycleError`](Error::KernelLifecycleError) for
//! failures during bootstrap, component initialization, and shutdown, and
//! the crate-wide [`Result`] alias.

use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::admin::error::AdminError;
use crate::commissioning::error::CommissioningError;
use crate::device::error::DeviceSystemError;
use crate::plugin_system::error::PluginSystemError;
use crate::storage::error::StorageSystemError;
use crate::topology::error::TopologyError;

/// Top-level error type for the bridge core
#[derive(Debug, ThisError)]
pub enum Error {
    /// Specific, typed plugin system error
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Specific, typed device system error
    #[error("Device system error: {0}")]
    DeviceSystem(#[from] DeviceSystemError),

    /// Specific, typed topology error
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    /// Specific, typed commissioning error
    #[error("Commissioning error: {0}")]
    Commissioning(#[from] CommissioningError),

    /// Specific, typed storage system error
    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    /// Specific, typed admin interface error
    #[error("Admin error: {0}")]
    Admin(#[from] AdminError),

    /// Error occurring during a specific kernel lifecycle phase.
    #[error("Kernel lifecycle error during {phase:?}: {message}")]
    KernelLifecycleError {
        phase: KernelLifecyclePhase,
        component_name: Option<String>,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Error related to the DependencyRegistry operations or component
    /// lookup failures.
    #[error("Component registry error during operation '{operation}': {message}")]
    ComponentRegistryError {
        operation: String,
        component_name: Option<String>,
        message: String,
    },

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Represents a specific phase in the kernel's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelLifecyclePhase {
    Bootstrap,
    Initialize,
    Start,
    Run,
    Shutdown,
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<std::io::Error> for Error {
    fn from(io_err: std::io::Error) -> Self {
        Error::StorageSystem(StorageSystemError::Io {
            source: io_err,
            path: PathBuf::new(),
            operation: "unknown".to_string(),
        })
    }
}

impl Error {
    /// Wrap an I/O error with the operation and path it came from.
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        Error::StorageSystem(StorageSystemError::io(source, operation, path))
    }

    /// Build a lifecycle error for `phase`, optionally naming the component
    /// and chaining the underlying error.
    pub fn lifecycle(
        phase: KernelLifecyclePhase,
        component_name: Option<&str>,
        message: impl Into<String>,
        source: Option<Error>,
    ) -> Self {
        Error::KernelLifecycleError {
            phase,
            component_name: component_name.map(str::to_string),
            message: message.into(),
            source: source.map(Box::new),
        }
    }
}
