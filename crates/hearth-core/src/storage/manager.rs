use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::kernel::component::KernelComponent;
use crate::kernel::error::Result;
use crate::storage::config::{ConfigData, ConfigFormat, ConfigManager, ConfigScope};
use crate::storage::context::StorageContext;
use crate::storage::error::StorageSystemError;
use crate::storage::local::LocalStorageProvider;
use crate::storage::provider::StorageProvider;

/// Storage manager component interface
#[async_trait]
pub trait StorageManager: KernelComponent + StorageProvider {}

/// Default implementation of StorageManager
///
/// Owns the provider, the config manager, and the set of open
/// [`StorageContext`]s. Contexts are cached per namespace so every caller
/// sees the same document.
pub struct DefaultStorageManager {
    name: &'static str,
    base_path: PathBuf,
    provider: Arc<dyn StorageProvider>,
    config_manager: Arc<ConfigManager>,
    app_config_path: PathBuf,
    plugin_config_path: PathBuf,
    context_path: PathBuf,
    contexts: Mutex<HashMap<String, Arc<StorageContext>>>,
}

impl DefaultStorageManager {
    /// Create a new default storage manager rooted at `base_path`,
    /// backed by a [`LocalStorageProvider`].
    pub fn new(base_path: PathBuf) -> Self {
        let app_config_path = base_path.join("config");
        let plugin_config_path = base_path.join("plugins").join("config");
        let context_path = base_path.join("context");

        let provider: Arc<dyn StorageProvider> =
            Arc::new(LocalStorageProvider::new(base_path.clone()));

        let config_manager = ConfigManager::new(
            Arc::clone(&provider),
            app_config_path.clone(),
            plugin_config_path.clone(),
            ConfigFormat::Json,
        );

        Self {
            name: "DefaultStorageManager",
            base_path,
            provider,
            config_manager: Arc::new(config_manager),
            app_config_path,
            plugin_config_path,
            context_path,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    /// Get the underlying provider
    pub fn provider(&self) -> &Arc<dyn StorageProvider> {
        &self.provider
    }

    /// Get the configuration manager instance
    pub fn config_manager(&self) -> &Arc<ConfigManager> {
        &self.config_manager
    }

    /// The storage root everything else hangs off
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the application configuration path
    pub fn app_config_path(&self) -> &Path {
        &self.app_config_path
    }

    /// Get the plugin configuration path
    pub fn plugin_config_path(&self) -> &Path {
        &self.plugin_config_path
    }

    /// Get the context document path
    pub fn context_path(&self) -> &Path {
        &self.context_path
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<()> {
        self.create_dir_all(&self.app_config_path)?;
        self.create_dir_all(&self.plugin_config_path)?;
        self.create_dir_all(&self.context_path)?;
        Ok(())
    }

    /// Open the [`StorageContext`] for `namespace`, reusing an already-open
    /// instance when one exists.
    pub fn context(&self, namespace: &str) -> Result<Arc<StorageContext>> {
        let mut contexts = self.lock_contexts(namespace)?;
        if let Some(existing) = contexts.get(namespace) {
            return Ok(Arc::clone(existing));
        }
        let context = Arc::new(StorageContext::open(
            Arc::clone(&self.provider),
            &self.context_path,
            namespace,
        )?);
        contexts.insert(namespace.to_string(), Arc::clone(&context));
        Ok(context)
    }

    /// Erase one namespace: drop its cached context and delete the document.
    pub fn wipe_context(&self, namespace: &str) -> Result<()> {
        let cached = {
            let mut contexts = self.lock_contexts(namespace)?;
            contexts.remove(namespace)
        };
        match cached {
            Some(context) => context.clear(),
            None => {
                let path = self.context_path.join(format!("{namespace}.json"));
                if self.provider.is_file(&path) {
                    self.provider.remove_file(&path)?;
                }
                Ok(())
            }
        }
    }

    /// Erase the entire storage root and recreate the directory skeleton.
    pub fn wipe_all(&self) -> Result<()> {
        {
            let mut contexts = self.lock_contexts("*")?;
            contexts.clear();
        }
        if self.provider.is_dir(&self.base_path) {
            self.provider.remove_dir_all(&self.base_path)?;
        }
        self.ensure_directories()
    }

    /// Flush every open context to disk and release the cache.
    pub fn close_contexts(&self) -> Result<()> {
        let contexts = {
            let mut guard = self.lock_contexts("*")?;
            std::mem::take(&mut *guard)
        };
        for context in contexts.values() {
            context.flush()?;
        }
        Ok(())
    }

    fn lock_contexts(
        &self,
        namespace: &str,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Arc<StorageContext>>>> {
        self.contexts.lock().map_err(|_| {
            StorageSystemError::ContextUnavailable {
                namespace: namespace.to_string(),
                message: "context cache lock poisoned".to_string(),
            }
            .into()
        })
    }
}

impl Debug for DefaultStorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultStorageManager")
            .field("name", &self.name)
            .field("base_path", &self.base_path)
            .field("provider", &self.provider.name())
            .finish()
    }
}

#[async_trait]
impl KernelComponent for DefaultStorageManager {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn initialize(&self) -> Result<()> {
        self.ensure_directories()?;
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.close_contexts()
    }
}

// Implement StorageProvider by delegating to the internal provider
impl StorageProvider for DefaultStorageManager {
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn exists(&self, path: &Path) -> bool {
        self.provider.exists(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.provider.is_file(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.provider.is_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.provider.create_dir_all(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.provider.read_to_string(path)
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<()> {
        self.provider.write_string(path, contents)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.provider.remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.provider.remove_dir_all(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.provider.read_dir(path)
    }
}

impl StorageManager for DefaultStorageManager {}

// Convenience passthroughs to the config manager
impl DefaultStorageManager {
    pub fn load_config(&self, name: &str, scope: ConfigScope) -> Result<ConfigData> {
        self.config_manager.load_config(name, scope)
    }

    pub fn list_configs(&self, scope: ConfigScope) -> Result<Vec<String>> {
        self.config_manager.list_configs(scope)
    }

    /// Load and reconcile a plugin's config against its registry identity.
    pub fn plugin_config(&self, plugin_name: &str, plugin_kind: &str) -> Result<ConfigData> {
        self.config_manager.plugin_config(plugin_name, plugin_kind)
    }

    pub fn save_plugin_config(&self, plugin_name: &str, config: &ConfigData) -> Result<()> {
        self.config_manager.save_plugin_config(plugin_name, config)
    }

    pub fn get_app_config(&self, name: &str) -> Result<ConfigData> {
        self.config_manager.get_app_config(name)
    }

    pub fn save_app_config(&self, name: &str, config: &ConfigData) -> Result<()> {
        self.config_manager.save_app_config(name, config)
    }
}
