use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json;
#[cfg(feature = "yaml-config")]
use serde_yaml;
#[cfg(feature = "toml-config")]
use toml;

use crate::kernel::error::Result;
use crate::storage::StorageProvider;
use crate::storage::error::StorageSystemError;

/// Config key carrying the owning plugin's name.
pub const CONFIG_KEY_NAME: &str = "name";
/// Config key carrying the owning plugin's kind.
pub const CONFIG_KEY_TYPE: &str = "type";
/// Config key toggling per-plugin debug logging.
pub const CONFIG_KEY_DEBUG: &str = "debug";
/// Config key requesting device unregistration during shutdown.
pub const CONFIG_KEY_UNREGISTER_ON_SHUTDOWN: &str = "unregisterOnShutdown";

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// In-memory representation of configuration data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigData {
    /// Raw configuration values
    #[serde(flatten)]
    values: HashMap<String, serde_json::Value>,
}

impl ConfigData {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Create a configuration from a HashMap
    pub fn from_hashmap(values: HashMap<String, serde_json::Value>) -> Self {
        Self { values }
    }

    /// Get a configuration value
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Get a configuration value with default
    pub fn get_or<T: for<'de> Deserialize<'de>>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Set a configuration value
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let json_value =
            serde_json::to_value(value).map_err(|e| StorageSystemError::SerializationError {
                format: "json".to_string(),
                source: Box::new(e),
            })?;
        self.values.insert(key.to_string(), json_value);
        Ok(())
    }

    /// Remove a configuration value
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.values.remove(key)
    }

    /// Check if key exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Get all keys
    pub fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Merge with another config, overriding existing values
    pub fn merge(&mut self, other: &ConfigData) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Serialize to string based on format
    pub fn serialize(&self, format: ConfigFormat) -> Result<String> {
        let map_err = |e: Box<dyn std::error::Error + Send + Sync>| {
            StorageSystemError::SerializationError {
                format: format.extension().to_string(),
                source: e,
            }
        };
        match format {
            ConfigFormat::Json => serde_json::to_string_pretty(&self)
                .map_err(|e| map_err(Box::new(e)).into()),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => {
                serde_yaml::to_string(&self).map_err(|e| map_err(Box::new(e)).into())
            }
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => {
                toml::to_string_pretty(&self).map_err(|e| map_err(Box::new(e)).into())
            }
        }
    }

    /// Deserialize from string based on format
    pub fn deserialize(data: &str, format: ConfigFormat) -> Result<Self> {
        let map_err = |e: Box<dyn std::error::Error + Send + Sync>| {
            StorageSystemError::DeserializationError {
                format: format.extension().to_string(),
                source: e,
            }
        };
        match format {
            ConfigFormat::Json => {
                serde_json::from_str(data).map_err(|e| map_err(Box::new(e)).into())
            }
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => {
                serde_yaml::from_str(data).map_err(|e| map_err(Box::new(e)).into())
            }
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| map_err(Box::new(e)).into()),
        }
    }
}

impl Default for ConfigData {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration scope determines where configuration is stored
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigScope {
    /// Bridge-wide application configuration
    Application,
    /// Per-plugin configuration
    Plugin,
}

/// Configuration manager that handles loading, saving, and caching configurations
pub struct ConfigManager {
    /// Storage provider for reading/writing configs
    provider: Arc<dyn StorageProvider>,
    /// Base path for application configurations
    app_config_path: PathBuf,
    /// Base path for per-plugin configurations
    plugin_config_path: PathBuf,
    /// Default format for new configurations
    default_format: ConfigFormat,
    /// In-memory cache of loaded configurations
    cache: Mutex<HashMap<String, ConfigData>>,
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("app_config_path", &self.app_config_path)
            .field("plugin_config_path", &self.plugin_config_path)
            .field("default_format", &self.default_format)
            .finish()
    }
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new(
        provider: Arc<dyn StorageProvider>,
        app_config_path: PathBuf,
        plugin_config_path: PathBuf,
        default_format: ConfigFormat,
    ) -> Self {
        Self {
            provider,
            app_config_path,
            plugin_config_path,
            default_format,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Get the app configuration path
    pub fn app_config_path(&self) -> &Path {
        &self.app_config_path
    }

    /// Get the plugin configuration path
    pub fn plugin_config_path(&self) -> &Path {
        &self.plugin_config_path
    }

    /// Get the default format
    pub fn default_format(&self) -> ConfigFormat {
        self.default_format
    }

    /// Resolve the complete path for a configuration file
    pub fn resolve_config_path(&self, name: &str, scope: ConfigScope) -> PathBuf {
        let base_path = match scope {
            ConfigScope::Application => &self.app_config_path,
            ConfigScope::Plugin => &self.plugin_config_path,
        };

        // Ensure name has appropriate extension
        let file_name = if Path::new(name).extension().is_some() {
            name.to_string()
        } else {
            format!("{}.{}", name, self.default_format.extension())
        };

        base_path.join(file_name)
    }

    fn cache_key(name: &str, scope: ConfigScope) -> String {
        match scope {
            ConfigScope::Application => format!("app:{}", name),
            ConfigScope::Plugin => format!("plugin:{}", name),
        }
    }

    fn cache_get(&self, key: &str) -> Option<ConfigData> {
        self.cache.lock().ok().and_then(|c| c.get(key).cloned())
    }

    fn cache_put(&self, key: String, config: ConfigData) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, config);
        }
    }

    /// Load configuration from disk
    pub fn load_config(&self, name: &str, scope: ConfigScope) -> Result<ConfigData> {
        let cache_key = Self::cache_key(name, scope);

        if let Some(config) = self.cache_get(&cache_key) {
            return Ok(config);
        }

        let path = self.resolve_config_path(name, scope);

        // If file doesn't exist, return default empty config
        if !self.provider.exists(&path) {
            let empty_config = ConfigData::new();
            self.cache_put(cache_key, empty_config.clone());
            return Ok(empty_config);
        }

        let format = ConfigFormat::from_path(&path)
            .ok_or(StorageSystemError::UnsupportedConfigFormat(path.clone()))?;

        let content = self.provider.read_to_string(&path)?;
        let config = ConfigData::deserialize(&content, format)?;

        self.cache_put(cache_key, config.clone());

        Ok(config)
    }

    /// Save configuration to disk
    pub fn save_config(&self, name: &str, config: &ConfigData, scope: ConfigScope) -> Result<()> {
        let path = self.resolve_config_path(name, scope);

        if let Some(parent) = path.parent() {
            self.provider.create_dir_all(parent)?;
        }

        // Determine format from file extension or use default
        let format = ConfigFormat::from_path(&path).unwrap_or(self.default_format);
        let content = config.serialize(format)?;
        self.provider.write_string(&path, &content)?;

        self.cache_put(Self::cache_key(name, scope), config.clone());

        Ok(())
    }

    /// Load a plugin's configuration, reconciling it with the plugin's
    /// registry identity.
    ///
    /// The `name` and `type` fields must match the registered plugin when
    /// present; a mismatch is rejected rather than silently overwritten.
    /// Missing identity fields and the `debug` / `unregisterOnShutdown`
    /// toggles are filled in with defaults, and the repaired document is
    /// written back so later readers see a complete config.
    pub fn plugin_config(&self, plugin_name: &str, plugin_kind: &str) -> Result<ConfigData> {
        let mut config = self.load_config(plugin_name, ConfigScope::Plugin)?;
        let mut dirty = false;

        match config.get::<String>(CONFIG_KEY_NAME) {
            Some(found) if found != plugin_name => {
                return Err(StorageSystemError::ConfigIdentityMismatch {
                    plugin: plugin_name.to_string(),
                    field: CONFIG_KEY_NAME,
                    expected: plugin_name.to_string(),
                    found,
                }
                .into());
            }
            Some(_) => {}
            None => {
                config.set(CONFIG_KEY_NAME, plugin_name)?;
                dirty = true;
            }
        }

        match config.get::<String>(CONFIG_KEY_TYPE) {
            Some(found) if found != plugin_kind => {
                return Err(StorageSystemError::ConfigIdentityMismatch {
                    plugin: plugin_name.to_string(),
                    field: CONFIG_KEY_TYPE,
                    expected: plugin_kind.to_string(),
                    found,
                }
                .into());
            }
            Some(_) => {}
            None => {
                config.set(CONFIG_KEY_TYPE, plugin_kind)?;
                dirty = true;
            }
        }

        if !config.contains_key(CONFIG_KEY_DEBUG) {
            config.set(CONFIG_KEY_DEBUG, false)?;
            dirty = true;
        }
        if !config.contains_key(CONFIG_KEY_UNREGISTER_ON_SHUTDOWN) {
            config.set(CONFIG_KEY_UNREGISTER_ON_SHUTDOWN, false)?;
            dirty = true;
        }

        if dirty {
            self.save_config(plugin_name, &config, ConfigScope::Plugin)?;
        }

        Ok(config)
    }

    /// Save plugin-specific configuration
    pub fn save_plugin_config(&self, plugin_name: &str, config: &ConfigData) -> Result<()> {
        self.save_config(plugin_name, config, ConfigScope::Plugin)
    }

    /// Get application configuration
    pub fn get_app_config(&self, name: &str) -> Result<ConfigData> {
        self.load_config(name, ConfigScope::Application)
    }

    /// Save application configuration
    pub fn save_app_config(&self, name: &str, config: &ConfigData) -> Result<()> {
        self.save_config(name, config, ConfigScope::Application)
    }

    /// Invalidate the cache for a specific configuration
    pub fn invalidate_cache(&self, name: &str, scope: ConfigScope) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(&Self::cache_key(name, scope));
        }
    }

    /// Clear the entire configuration cache
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// List available configuration files
    pub fn list_configs(&self, scope: ConfigScope) -> Result<Vec<String>> {
        let dir_path = match scope {
            ConfigScope::Application => self.app_config_path.clone(),
            ConfigScope::Plugin => self.plugin_config_path.clone(),
        };

        if !self.provider.exists(&dir_path) {
            return Ok(vec![]);
        }

        let entries = self.provider.read_dir(&dir_path)?;

        let config_files = entries
            .into_iter()
            .filter_map(|path| {
                if self.provider.is_file(&path) && ConfigFormat::from_path(&path).is_some() {
                    path.file_stem()
                        .and_then(|stem| stem.to_str().map(String::from))
                } else {
                    None
                }
            })
            .collect();

        Ok(config_files)
    }
}
