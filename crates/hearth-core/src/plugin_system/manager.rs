//! # Hearth Core Platform Orchestrator
//!
//! Drives every registered plugin through its lifecycle: load, start,
//! configure, and back down again via disable/remove. The orchestrator owns
//! the plugin registry, resolves factories through the [`PluginLoader`] and
//! persists a registry snapshot on each admin-visible transition so a
//! restart sees the same plugin set.
//!
//! Failures stay per-plugin. A failing hook latches the plugin's error flag
//! and is reported to the caller, but never takes the process down; the
//! startup supervisor decides what an errored plugin means for the bridge
//! as a whole.
//!
//! Start hooks run on a supervised [`JoinSet`]. Each spawned task re-reads
//! the plugin's flags once its hook returns, so a plugin that was removed or
//! errored while the hook was in flight has its result discarded instead of
//! resurrecting stale state.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::kernel::component::KernelComponent;
use crate::kernel::constants::REGISTRY_NAMESPACE;
use crate::kernel::error::{Error, Result};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::loader::PluginLoader;
use crate::plugin_system::registry::{PluginRegistry, SharedPluginRegistry};
use crate::plugin_system::traits::{
    plugin_log_target, PlatformFactory, PlatformHandle, PlatformPlugin,
};
use crate::plugin_system::types::{PluginMetadata, PluginRecord};
use crate::storage::config::{
    ConfigData, CONFIG_KEY_DEBUG, CONFIG_KEY_NAME, CONFIG_KEY_TYPE,
    CONFIG_KEY_UNREGISTER_ON_SHUTDOWN,
};
use crate::storage::error::StorageSystemError;
use crate::storage::manager::DefaultStorageManager;
use crate::topology::manager::TopologyManager;

/// Key inside the registry namespace holding the ordered record snapshot.
const REGISTRY_KEY: &str = "registered";

/// Central plugin lifecycle driver, also a kernel component.
#[derive(Clone)]
pub struct PlatformOrchestrator {
    name: &'static str,
    registry: SharedPluginRegistry,
    loader: Arc<PluginLoader>,
    storage: Arc<DefaultStorageManager>,
    topology: Arc<TopologyManager>,
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl PlatformOrchestrator {
    pub fn new(
        registry: SharedPluginRegistry,
        loader: Arc<PluginLoader>,
        storage: Arc<DefaultStorageManager>,
        topology: Arc<TopologyManager>,
    ) -> Self {
        PlatformOrchestrator {
            name: "PlatformOrchestrator",
            registry,
            loader,
            storage,
            topology,
            tasks: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    pub fn registry(&self) -> &SharedPluginRegistry {
        &self.registry
    }

    pub fn loader(&self) -> &Arc<PluginLoader> {
        &self.loader
    }

    /// Register a built-in platform factory and make sure a registry record
    /// exists for it. An already persisted record keeps its toggles but has
    /// its static metadata refreshed.
    pub async fn register_builtin(
        &self,
        metadata: PluginMetadata,
        factory: PlatformFactory,
    ) -> Result<()> {
        self.loader.register_builtin(metadata.name.clone(), factory);
        {
            let mut registry = self.registry.lock().await;
            match registry.get_mut(&metadata.name) {
                Some(entry) => {
                    entry.record.version = metadata.version;
                    entry.record.description = metadata.description;
                    entry.record.author = metadata.author;
                    entry.record.kind = metadata.kind;
                }
                None => {
                    let name = metadata.name.clone();
                    registry.register(PluginRecord::new(metadata, None))?;
                    log::info!("Registered built-in plugin '{}'", name);
                }
            }
        }
        self.persist_snapshot().await
    }

    /// Register a dynamic plugin from its manifest. `path` may be the plugin
    /// directory or the manifest file itself. Returns the plugin name.
    pub async fn add(&self, path: &Path) -> Result<String> {
        let (metadata, plugin_dir) = PluginLoader::read_manifest(path)?;
        let name = metadata.name.clone();
        {
            let mut registry = self.registry.lock().await;
            registry.register(PluginRecord::new(metadata, Some(plugin_dir)))?;
        }
        self.persist_snapshot().await?;
        log::info!("Registered plugin '{}' from {}", name, path.display());
        Ok(name)
    }

    /// Remove a plugin entirely: devices, shutdown hook, instance, record.
    pub async fn remove(&self, name: &str) -> Result<()> {
        self.ensure_registered(name).await?;
        self.deactivate(name, false, "removed").await?;
        log::info!("Removed plugin '{}'", name);
        Ok(())
    }

    /// Mark a plugin enabled. Takes effect on the next load.
    pub async fn enable(&self, name: &str) -> Result<()> {
        {
            let mut registry = self.registry.lock().await;
            let entry = registry
                .get_mut(name)
                .ok_or_else(|| PluginSystemError::NotRegistered {
                    plugin: name.to_string(),
                })?;
            entry.record.enabled = true;
        }
        self.persist_snapshot().await?;
        log::info!("Enabled plugin '{}'", name);
        Ok(())
    }

    /// Disable a plugin and wind its runtime state down, keeping the record.
    pub async fn disable(&self, name: &str) -> Result<()> {
        {
            let mut registry = self.registry.lock().await;
            let entry = registry
                .get_mut(name)
                .ok_or_else(|| PluginSystemError::NotRegistered {
                    plugin: name.to_string(),
                })?;
            // Flip first so a concurrent load observes NotEnabled.
            entry.record.enabled = false;
        }
        self.deactivate(name, true, "disabled").await?;
        log::info!("Disabled plugin '{}'", name);
        Ok(())
    }

    /// Instantiate a plugin's platform and run its load hook.
    pub async fn load(&self, name: &str) -> Result<()> {
        let target = plugin_log_target(name);
        let (kind, path) = {
            let registry = self.registry.lock().await;
            let entry = registry
                .get(name)
                .ok_or_else(|| PluginSystemError::NotRegistered {
                    plugin: name.to_string(),
                })?;
            if !entry.record.enabled {
                return Err(PluginSystemError::NotEnabled {
                    plugin: name.to_string(),
                }
                .into());
            }
            if entry.platform.is_some() {
                return Err(PluginSystemError::AlreadyLoaded {
                    plugin: name.to_string(),
                }
                .into());
            }
            (entry.record.kind, entry.record.path.clone())
        };

        let platform = match self.loader.instantiate(name, path.as_deref()) {
            Ok(platform) => platform,
            Err(e) => return self.fail_load(name, e.into()).await,
        };
        if platform.name() != name {
            let error = PluginSystemError::LoadingError {
                plugin: name.to_string(),
                path,
                message: format!("instance reports name '{}'", platform.name()),
            };
            return self.fail_load(name, error.into()).await;
        }
        if platform.kind() != kind {
            let error = PluginSystemError::LoadingError {
                plugin: name.to_string(),
                path,
                message: format!(
                    "instance reports kind {}, record says {}",
                    platform.kind(),
                    kind
                ),
            };
            return self.fail_load(name, error.into()).await;
        }

        let config = match self.storage.plugin_config(name, kind.as_str()) {
            Ok(config) => config,
            Err(e) => return self.fail_load(name, e).await,
        };

        let handle = Arc::new(PlatformHandle::new(
            name,
            kind,
            config,
            self.topology.clone(),
        ));
        if let Err(e) = platform.on_load(handle.clone()).await {
            let error = PluginSystemError::LoadingError {
                plugin: name.to_string(),
                path,
                message: e.to_string(),
            };
            return self.fail_load(name, error.into()).await;
        }

        let version = platform.version().to_string();
        {
            let mut registry = self.registry.lock().await;
            let entry = registry
                .get_mut(name)
                .ok_or_else(|| PluginSystemError::NotRegistered {
                    plugin: name.to_string(),
                })?;
            // Re-validate after the load hook: a concurrent load may have
            // won the slot.
            if entry.platform.is_some() {
                return Err(PluginSystemError::AlreadyLoaded {
                    plugin: name.to_string(),
                }
                .into());
            }
            entry.record.version = version;
            entry.record.mark_loaded();
            entry.platform = Some(platform);
            entry.handle = Some(handle);
        }
        self.persist_snapshot().await?;
        log::info!(target: target.as_str(), "Loaded platform '{}'", name);
        Ok(())
    }

    /// Issue the start hook for a loaded plugin. Idempotent; the hook runs
    /// on the orchestrator's task set and the call returns immediately.
    pub async fn start(&self, name: &str, reason: Option<String>) -> Result<()> {
        let platform = {
            let registry = self.registry.lock().await;
            let entry = registry
                .get(name)
                .ok_or_else(|| PluginSystemError::NotRegistered {
                    plugin: name.to_string(),
                })?;
            if !entry.record.loaded || entry.record.started || entry.record.error {
                log::debug!(
                    "Skipping start for plugin '{}' (loaded={}, started={}, error={})",
                    name,
                    entry.record.loaded,
                    entry.record.started,
                    entry.record.error
                );
                return Ok(());
            }
            match entry.platform.clone() {
                Some(platform) => platform,
                None => {
                    return Err(PluginSystemError::InternalError(format!(
                        "plugin '{name}' is flagged loaded but has no instance"
                    ))
                    .into());
                }
            }
        };

        let orchestrator = self.clone();
        let plugin = name.to_string();
        let mut tasks = self.tasks.lock().await;
        tasks.spawn(async move {
            let target = plugin_log_target(&plugin);
            let result = platform.on_start(reason.as_deref()).await;
            {
                let mut registry = orchestrator.registry.lock().await;
                let Some(entry) = registry.get_mut(&plugin) else {
                    log::warn!(
                        target: target.as_str(),
                        "Discarding start result for removed plugin '{}'",
                        plugin
                    );
                    return;
                };
                // Re-validate on resume.
                if !entry.record.loaded || entry.record.error {
                    log::debug!(
                        target: target.as_str(),
                        "Discarding start result for plugin '{}' (state changed mid-hook)",
                        plugin
                    );
                    return;
                }
                match result {
                    Ok(()) => {
                        entry.record.mark_started();
                        log::info!(target: target.as_str(), "Started platform '{}'", plugin);
                    }
                    Err(e) => {
                        entry.record.mark_error();
                        let error = PluginSystemError::StartError {
                            plugin: plugin.clone(),
                            message: e.to_string(),
                        };
                        log::error!(target: target.as_str(), "{}", error);
                    }
                }
            }
            if let Err(e) = orchestrator.persist_snapshot().await {
                log::warn!("Failed to persist plugin registry snapshot: {}", e);
            }
        });
        Ok(())
    }

    /// Run the configure hook for a started plugin, then flush its config.
    pub async fn configure(&self, name: &str) -> Result<()> {
        let target = plugin_log_target(name);
        let (platform, handle) = {
            let registry = self.registry.lock().await;
            let entry = registry
                .get(name)
                .ok_or_else(|| PluginSystemError::NotRegistered {
                    plugin: name.to_string(),
                })?;
            let record = &entry.record;
            if !record.loaded || !record.started || record.configured || record.error {
                log::debug!(
                    "Skipping configure for plugin '{}' (loaded={}, started={}, configured={}, error={})",
                    name,
                    record.loaded,
                    record.started,
                    record.configured,
                    record.error
                );
                return Ok(());
            }
            match (entry.platform.clone(), entry.handle.clone()) {
                (Some(platform), Some(handle)) => (platform, handle),
                _ => {
                    return Err(PluginSystemError::InternalError(format!(
                        "plugin '{name}' is flagged started but has no instance"
                    ))
                    .into());
                }
            }
        };

        let result = platform.on_configure().await;
        {
            let mut registry = self.registry.lock().await;
            let Some(entry) = registry.get_mut(name) else {
                return Err(PluginSystemError::NotRegistered {
                    plugin: name.to_string(),
                }
                .into());
            };
            if !entry.record.loaded || !entry.record.started {
                log::debug!(
                    target: target.as_str(),
                    "Discarding configure result for plugin '{}' (state changed mid-hook)",
                    name
                );
                return Ok(());
            }
            match result {
                Ok(()) => entry.record.mark_configured(),
                Err(e) => {
                    entry.record.mark_error();
                    drop(registry);
                    let error = PluginSystemError::ConfigureError {
                        plugin: name.to_string(),
                        message: e.to_string(),
                    };
                    log::error!(target: target.as_str(), "{}", error);
                    self.persist_snapshot().await?;
                    return Err(error.into());
                }
            }
        }

        self.storage
            .save_plugin_config(name, &handle.config_snapshot())?;
        self.persist_snapshot().await?;
        log::info!(target: target.as_str(), "Configured platform '{}'", name);
        Ok(())
    }

    /// Validate and persist a plugin config supplied by the admin surface,
    /// updating the live handle's working copy when the plugin is loaded.
    pub async fn save_config(&self, name: &str, mut config: ConfigData) -> Result<()> {
        let kind = {
            let registry = self.registry.lock().await;
            let entry = registry
                .get(name)
                .ok_or_else(|| PluginSystemError::NotRegistered {
                    plugin: name.to_string(),
                })?;
            entry.record.kind
        };

        match config.get::<String>(CONFIG_KEY_NAME) {
            Some(found) if found != name => {
                return Err(StorageSystemError::ConfigIdentityMismatch {
                    plugin: name.to_string(),
                    field: CONFIG_KEY_NAME,
                    expected: name.to_string(),
                    found,
                }
                .into());
            }
            Some(_) => {}
            None => config.set(CONFIG_KEY_NAME, name)?,
        }
        match config.get::<String>(CONFIG_KEY_TYPE) {
            Some(found) if found != kind.as_str() => {
                return Err(StorageSystemError::ConfigIdentityMismatch {
                    plugin: name.to_string(),
                    field: CONFIG_KEY_TYPE,
                    expected: kind.as_str().to_string(),
                    found,
                }
                .into());
            }
            Some(_) => {}
            None => config.set(CONFIG_KEY_TYPE, kind.as_str())?,
        }
        if !config.contains_key(CONFIG_KEY_DEBUG) {
            config.set(CONFIG_KEY_DEBUG, false)?;
        }
        if !config.contains_key(CONFIG_KEY_UNREGISTER_ON_SHUTDOWN) {
            config.set(CONFIG_KEY_UNREGISTER_ON_SHUTDOWN, false)?;
        }

        self.storage.save_plugin_config(name, &config)?;
        let handle = {
            let registry = self.registry.lock().await;
            registry.handle(name)
        };
        if let Some(handle) = handle {
            handle.replace_config(config);
        }
        log::info!("Saved config for plugin '{}'", name);
        Ok(())
    }

    /// Issue load plus start for every enabled plugin, in registry order.
    /// Load failures are isolated and logged; starts are not awaited.
    /// Returns how many plugins were issued.
    pub async fn startup_all(&self, reason: Option<String>) -> Result<usize> {
        let names: Vec<String> = {
            let registry = self.registry.lock().await;
            registry
                .entries()
                .iter()
                .filter(|entry| entry.record.enabled)
                .map(|entry| entry.record.name.clone())
                .collect()
        };

        let mut issued = 0;
        for name in &names {
            if let Err(e) = self.load(name).await {
                log::error!("Plugin '{}' failed to load: {}", name, e);
                continue;
            }
            if let Err(e) = self.start(name, reason.clone()).await {
                log::error!("Plugin '{}' failed to start: {}", name, e);
                continue;
            }
            issued += 1;
        }
        Ok(issued)
    }

    /// Run the configure hook for every plugin that reached started.
    /// Returns how many configured successfully.
    pub async fn configure_all(&self) -> usize {
        let names: Vec<String> = {
            let registry = self.registry.lock().await;
            registry
                .entries()
                .iter()
                .filter(|entry| {
                    let r = &entry.record;
                    r.enabled && r.loaded && r.started && !r.configured && !r.error
                })
                .map(|entry| entry.record.name.clone())
                .collect()
        };

        let mut configured = 0;
        for name in &names {
            match self.configure(name).await {
                Ok(()) => configured += 1,
                Err(e) => log::error!("Plugin '{}' failed to configure: {}", name, e),
            }
        }
        configured
    }

    /// Invoke the shutdown hook of every enabled, non-errored plugin with
    /// the given reason. Plugins whose config asks for it have their devices
    /// unregistered first. Hook failures are logged, never propagated.
    /// Returns how many hooks ran.
    pub async fn run_shutdown_hooks(&self, reason: &str) -> usize {
        type HookEntry = (
            String,
            Option<Arc<dyn PlatformPlugin>>,
            Option<Arc<PlatformHandle>>,
        );
        let candidates: Vec<HookEntry> = {
            let registry = self.registry.lock().await;
            registry
                .entries()
                .iter()
                .filter(|entry| entry.record.enabled && !entry.record.error)
                .map(|entry| {
                    (
                        entry.record.name.clone(),
                        entry.platform.clone(),
                        entry.handle.clone(),
                    )
                })
                .collect()
        };

        let mut invoked = 0;
        for (name, platform, handle) in candidates {
            let target = plugin_log_target(&name);
            let unregister = handle
                .as_ref()
                .map(|handle| {
                    handle
                        .config_snapshot()
                        .get_or(CONFIG_KEY_UNREGISTER_ON_SHUTDOWN, false)
                })
                .unwrap_or(false);
            if unregister {
                match self.topology.remove_all_for_plugin(&name).await {
                    Ok(removed) => log::info!(
                        target: target.as_str(),
                        "Unregistered {} device(s) for plugin '{}' on shutdown",
                        removed,
                        name
                    ),
                    Err(e) => log::warn!(
                        target: target.as_str(),
                        "Failed to unregister devices for plugin '{}': {}",
                        name,
                        e
                    ),
                }
            }
            let Some(platform) = platform else {
                continue;
            };
            if let Err(e) = platform.on_shutdown(Some(reason)).await {
                log::warn!(
                    target: target.as_str(),
                    "Shutdown hook for plugin '{}' failed: {}",
                    name,
                    e
                );
            } else {
                log::debug!(target: target.as_str(), "Shutdown hook for plugin '{}' done", name);
            }
            invoked += 1;
        }
        invoked
    }

    /// Abort every in-flight hook task and drain the set.
    pub async fn abort_tasks(&self) {
        let mut tasks = self.tasks.lock().await;
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
    }

    /// Write the ordered record snapshot to the registry namespace.
    pub async fn persist_snapshot(&self) -> Result<()> {
        let records = {
            let registry = self.registry.lock().await;
            registry.records()
        };
        persist_registry_records(&self.storage, &records)
    }

    async fn restore_snapshot(&self) -> Result<usize> {
        let context = self.storage.context(REGISTRY_NAMESPACE)?;
        let Some(records) = context.get::<Vec<PluginRecord>>(REGISTRY_KEY)? else {
            return Ok(0);
        };
        let count = records.len();
        let mut registry = self.registry.lock().await;
        registry.load_snapshot(records);
        Ok(count)
    }

    async fn ensure_registered(&self, name: &str) -> Result<()> {
        let registry = self.registry.lock().await;
        if !registry.is_registered(name) {
            return Err(PluginSystemError::NotRegistered {
                plugin: name.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Wind a plugin's runtime state down: devices out, shutdown hook,
    /// instance dropped, flags and counters reset. `keep_entry` decides
    /// whether the record itself survives.
    async fn deactivate(&self, name: &str, keep_entry: bool, reason: &str) -> Result<()> {
        let target = plugin_log_target(name);
        match self.topology.remove_all_for_plugin(name).await {
            Ok(removed) if removed > 0 => log::info!(
                target: target.as_str(),
                "Removed {} device(s) for plugin '{}'",
                removed,
                name
            ),
            Ok(_) => {}
            Err(e) => log::warn!(
                target: target.as_str(),
                "Failed to remove devices for plugin '{}': {}",
                name,
                e
            ),
        }

        let platform = {
            let registry = self.registry.lock().await;
            registry.platform(name)
        };
        if let Some(platform) = platform {
            if let Err(e) = platform.on_shutdown(Some(reason)).await {
                log::warn!(
                    target: target.as_str(),
                    "Shutdown hook for plugin '{}' failed: {}",
                    name,
                    e
                );
            }
        }

        {
            let mut registry = self.registry.lock().await;
            if keep_entry {
                if let Some(entry) = registry.get_mut(name) {
                    entry.platform = None;
                    entry.handle = None;
                    entry.record.loaded = false;
                    entry.record.started = false;
                    entry.record.configured = false;
                    entry.record.locked = false;
                    entry.record.registered_devices = None;
                    entry.record.added_devices = None;
                }
            } else {
                registry.unregister(name)?;
            }
        }
        self.persist_snapshot().await
    }

    /// Latch the error flag after a failed load, persist, return the error.
    async fn fail_load(&self, name: &str, error: Error) -> Result<()> {
        {
            let mut registry = self.registry.lock().await;
            if let Some(entry) = registry.get_mut(name) {
                entry.record.mark_error();
            }
        }
        if let Err(e) = self.persist_snapshot().await {
            log::warn!("Failed to persist plugin registry snapshot: {}", e);
        }
        Err(error)
    }
}

impl fmt::Debug for PlatformOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformOrchestrator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KernelComponent for PlatformOrchestrator {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn initialize(&self) -> Result<()> {
        let restored = self.restore_snapshot().await?;
        if restored > 0 {
            log::info!("Restored {} plugin record(s)", restored);
        }
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        // Plugin startup is driven explicitly by the run loop so the start
        // reason can be threaded through.
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.abort_tasks().await;
        log::debug!("Platform orchestrator stopped");
        Ok(())
    }
}

/// Make a new empty shared registry.
pub fn create_shared_registry() -> SharedPluginRegistry {
    Arc::new(Mutex::new(PluginRegistry::new()))
}

/// Write an ordered record snapshot to the registry namespace. Shared with
/// the topology manager, which refreshes pairing state into the records.
pub fn persist_registry_records(
    storage: &DefaultStorageManager,
    records: &[PluginRecord],
) -> Result<()> {
    let context = storage.context(REGISTRY_NAMESPACE)?;
    context.set(REGISTRY_KEY, &records)?;
    Ok(())
}
