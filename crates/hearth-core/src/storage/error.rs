//! # Hearth Storage System Errors
//!
//! Defines error types specific to the hearth storage system: file I/O,
//! serialization of persisted namespaces, and per-plugin configuration
//! validation failures.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageSystemError {
    #[error("I/O error during operation '{operation}' on path '{path}': {source}")]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found at path: {0}")]
    FileNotFound(PathBuf),

    #[error("Serialization to '{format}' failed: {source}")]
    SerializationError {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Deserialization from '{format}' failed: {source}")]
    DeserializationError {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Unknown or unsupported config format for path: {0}")]
    UnsupportedConfigFormat(PathBuf),

    #[error(
        "Config for plugin '{plugin}' declares {field} = '{found}' but the plugin reports '{expected}'"
    )]
    ConfigIdentityMismatch {
        plugin: String,
        field: &'static str,
        expected: String,
        found: String,
    },

    #[error("Persisted context '{namespace}' is unavailable: {message}")]
    ContextUnavailable { namespace: String, message: String },

    #[error("Storage operation '{operation}' failed for path '{path}': {message}")]
    OperationFailed {
        operation: String,
        path: PathBuf,
        message: String,
    },
}

impl StorageSystemError {
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        StorageSystemError::Io {
            source,
            operation: operation.into(),
            path,
        }
    }
}
