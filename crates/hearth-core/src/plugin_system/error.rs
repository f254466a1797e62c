use std::path::PathBuf;

use thiserror::Error;

/// Errors specific to platform plugin registration, loading and lifecycle.
///
/// Every variant carries the plugin name where one is known so that a failure
/// can be pinned to the plugin it isolates. None of these abort the process:
/// the orchestrator converts them into the plugin's error flag and the bridge
/// keeps serving the plugins that did come up.
#[derive(Debug, Error)]
pub enum PluginSystemError {
    #[error("Plugin '{plugin}' is not registered")]
    NotRegistered { plugin: String },

    #[error("Plugin '{plugin}' is disabled")]
    NotEnabled { plugin: String },

    #[error("Plugin '{plugin}' is already registered")]
    AlreadyRegistered { plugin: String },

    #[error("Plugin '{plugin}' is already loaded")]
    AlreadyLoaded { plugin: String },

    #[error("Loading plugin '{plugin}' failed: {message}")]
    LoadingError {
        plugin: String,
        path: Option<PathBuf>,
        message: String,
    },

    #[error("Plugin manifest error for '{path}': {message}")]
    ManifestError {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Plugin '{plugin}' was built against platform API {found}, host expects {expected}")]
    ApiVersionMismatch {
        plugin: String,
        expected: u32,
        found: u32,
    },

    #[error("Starting plugin '{plugin}' failed: {message}")]
    StartError { plugin: String, message: String },

    #[error("Configuring plugin '{plugin}' failed: {message}")]
    ConfigureError { plugin: String, message: String },

    #[error("Plugin '{plugin}' did not become ready after {attempts} attempts")]
    RetryExhausted { plugin: String, attempts: u32 },

    #[error("Startup supervision for plugin '{plugin}' was aborted")]
    StartupAborted { plugin: String },

    #[error("Internal plugin system error: {0}")]
    InternalError(String),
}
