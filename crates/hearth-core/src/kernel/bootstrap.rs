use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::admin::handler::AdminHandler;
use crate::commissioning::engine::{InMemoryEngine, ProtocolEngine};
use crate::commissioning::manager::CommissioningManager;
use crate::device::registry::DeviceManager;
use crate::event::dispatcher::EventHandlerFn;
use crate::event::manager::{DefaultEventManager, EventManager};
use crate::event::types::{BridgeEvent, EventId, EventKind, EventResult};
use crate::kernel::component::{DependencyRegistry, KernelComponent};
use crate::kernel::constants::{
    APP_NAME, APP_VERSION, BRIDGE_CONFIG_NAME, PROTOCOL_FLUSH_DELAY_MS, STARTUP_MAX_ATTEMPTS,
    STARTUP_POLL_INTERVAL_MS, STORAGE_DIR_NAME, STORE_FLUSH_DELAY_MS, VERSION_POLL_INTERVAL_MS,
};
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::plugin_system::loader::PluginLoader;
use crate::plugin_system::manager::{create_shared_registry, PlatformOrchestrator};
use crate::plugin_system::supervisor::{StartupOutcome, StartupSupervisor};
use crate::plugin_system::updates::{NoopPackageManager, PackageManager, UpdateChecker};
use crate::shutdown::coordinator::{ResetAction, ShutdownCoordinator, ShutdownKind};
use crate::shutdown::scheduler::{Scheduler, TokioScheduler};
use crate::storage::manager::DefaultStorageManager;
use crate::topology::manager::{BridgeMode, TopologyManager};

/// How one bridge run ended. The binary's outer loop decides what each
/// outcome means for the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Exit the process.
    Shutdown,
    /// Construct a fresh context and run again.
    Restart,
    /// Let the package manager update packages, then run again.
    Update,
}

/// Everything a [`Hearth`] needs to know before construction. Plain data;
/// collaborators (engine, package manager, scheduler) are passed separately.
#[derive(Debug, Clone)]
pub struct HearthConfig {
    /// Storage root for configs, contexts and plugin state.
    pub base_path: PathBuf,
    pub mode: BridgeMode,
    /// Reason threaded into plugin start hooks, set by the outer loop on
    /// restart so plugins can tell a restart from a cold boot.
    pub startup_reason: Option<String>,
    pub startup_poll_interval: Duration,
    pub startup_max_attempts: u32,
    pub protocol_flush_delay: Duration,
    pub store_flush_delay: Duration,
    pub version_poll_interval: Duration,
    pub version_checks: bool,
}

impl Default for HearthConfig {
    fn default() -> Self {
        HearthConfig {
            base_path: default_base_path(),
            mode: BridgeMode::Bridge,
            startup_reason: None,
            startup_poll_interval: Duration::from_millis(STARTUP_POLL_INTERVAL_MS),
            startup_max_attempts: STARTUP_MAX_ATTEMPTS,
            protocol_flush_delay: Duration::from_millis(PROTOCOL_FLUSH_DELAY_MS),
            store_flush_delay: Duration::from_millis(STORE_FLUSH_DELAY_MS),
            version_poll_interval: Duration::from_millis(VERSION_POLL_INTERVAL_MS),
            version_checks: true,
        }
    }
}

impl HearthConfig {
    /// Defaults overlaid with the persisted bridge config document at
    /// `base_path`, if one exists. The binary applies CLI overrides on top.
    pub fn load(base_path: PathBuf) -> Result<Self> {
        let storage = DefaultStorageManager::new(base_path.clone());
        let document = storage.get_app_config(BRIDGE_CONFIG_NAME)?;

        let mut config = HearthConfig {
            base_path,
            ..HearthConfig::default()
        };
        if let Some(mode) = document.get::<String>("mode") {
            config.mode = mode.parse()?;
        }
        if let Some(attempts) = document.get::<u32>("startupMaxAttempts") {
            config.startup_max_attempts = attempts.max(1);
        }
        if let Some(enabled) = document.get::<bool>("versionChecks") {
            config.version_checks = enabled;
        }
        Ok(config)
    }
}

/// Storage root under the user's home directory, falling back to the
/// working directory when `HOME` is unset.
pub fn default_base_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STORAGE_DIR_NAME)
}

/// One bridge run: owns every subsystem, walks them through the kernel
/// component lifecycle, and drives startup until a terminal event ends the
/// run.
///
/// Construction wires the dependency graph but touches no disk or network;
/// [`run`](Self::run) does the work. The outer loop in the binary constructs
/// a fresh `Hearth` per run, so restart always starts from a clean context.
pub struct Hearth {
    config: HearthConfig,
    initialized: bool,
    dependencies: Arc<Mutex<DependencyRegistry>>,
    storage: Arc<DefaultStorageManager>,
    events: DefaultEventManager,
    commissioning: Arc<CommissioningManager>,
    devices: DeviceManager,
    topology: Arc<TopologyManager>,
    orchestrator: Arc<PlatformOrchestrator>,
    coordinator: Arc<ShutdownCoordinator>,
    engine: Arc<dyn ProtocolEngine>,
    packages: Arc<dyn PackageManager>,
    scheduler: Arc<dyn Scheduler>,
}

impl Hearth {
    /// Wire a context with the default collaborators: the in-memory
    /// protocol engine, no package manager, and the tokio scheduler.
    pub fn new(config: HearthConfig) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(InMemoryEngine::new()),
            Arc::new(NoopPackageManager),
            Arc::new(TokioScheduler),
        )
    }

    /// Wire a context around explicit collaborators. Tests inject engines
    /// and schedulers here; hosts with a real package manager do too.
    pub fn with_collaborators(
        config: HearthConfig,
        engine: Arc<dyn ProtocolEngine>,
        packages: Arc<dyn PackageManager>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        log::info!(
            "Initializing {} v{} ({} mode)",
            APP_NAME,
            APP_VERSION,
            config.mode
        );

        let storage = Arc::new(DefaultStorageManager::new(config.base_path.clone()));
        let events = DefaultEventManager::new();
        let commissioning = Arc::new(CommissioningManager::new(Arc::clone(&storage)));
        let devices = DeviceManager::new();
        let plugin_registry = create_shared_registry();

        let topology = Arc::new(TopologyManager::new(
            config.mode,
            Arc::clone(&engine),
            Arc::clone(&commissioning),
            devices.clone(),
            plugin_registry.clone(),
            Arc::clone(&storage),
        ));

        let orchestrator = Arc::new(PlatformOrchestrator::new(
            plugin_registry,
            Arc::new(PluginLoader::new()),
            Arc::clone(&storage),
            Arc::clone(&topology),
        ));

        let coordinator = Arc::new(
            ShutdownCoordinator::new(
                Arc::clone(&orchestrator),
                Arc::clone(&engine),
                Arc::clone(&storage),
                devices.clone(),
                events.clone(),
                Arc::clone(&scheduler),
            )
            .with_delays(config.protocol_flush_delay, config.store_flush_delay),
        );

        let mut registry = DependencyRegistry::new();
        registry.register_instance(Arc::clone(&storage));
        registry.register_instance(Arc::new(events.clone()));
        registry.register_instance(Arc::clone(&commissioning));
        registry.register_instance(Arc::new(devices.clone()));
        registry.register_instance(Arc::clone(&topology));
        registry.register_instance(Arc::clone(&orchestrator));

        Hearth {
            config,
            initialized: false,
            dependencies: Arc::new(Mutex::new(registry)),
            storage,
            events,
            commissioning,
            devices,
            topology,
            orchestrator,
            coordinator,
            engine,
            packages,
            scheduler,
        }
    }

    pub fn config(&self) -> &HearthConfig {
        &self.config
    }

    pub fn storage(&self) -> Arc<DefaultStorageManager> {
        Arc::clone(&self.storage)
    }

    pub fn events(&self) -> &DefaultEventManager {
        &self.events
    }

    pub fn commissioning(&self) -> Arc<CommissioningManager> {
        Arc::clone(&self.commissioning)
    }

    pub fn devices(&self) -> &DeviceManager {
        &self.devices
    }

    pub fn topology(&self) -> Arc<TopologyManager> {
        Arc::clone(&self.topology)
    }

    pub fn orchestrator(&self) -> Arc<PlatformOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    pub fn coordinator(&self) -> Arc<ShutdownCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn engine(&self) -> &Arc<dyn ProtocolEngine> {
        &self.engine
    }

    pub fn packages(&self) -> Arc<dyn PackageManager> {
        Arc::clone(&self.packages)
    }

    /// Build an admin handler bound to this context's subsystems.
    pub fn admin_handler(&self) -> AdminHandler {
        AdminHandler::new(
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.coordinator),
            Arc::clone(&self.topology),
            self.devices.clone(),
            Arc::clone(&self.packages),
        )
    }

    /// Get a component instance by its concrete type.
    pub async fn get_component<T: KernelComponent + 'static>(&self) -> Option<Arc<T>> {
        let registry = self.dependencies.lock().await;
        registry.get_concrete::<T>()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Run the bridge until a terminal event arrives.
    ///
    /// Initializes and starts every component in dependency order, issues
    /// plugin startup, waits for the supervisor's verdict, and only then
    /// opens the commissioning servers. A startup abort leaves the process
    /// up without network so an operator can disable or fix the failing
    /// plugin; fatal initialization errors run the coordinator before the
    /// error is returned.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        if self.initialized || self.coordinator.in_progress() {
            return Err(Error::lifecycle(
                KernelLifecyclePhase::Run,
                None,
                "context already ran; construct a fresh one",
                None,
            ));
        }

        if let Err(e) = self.initialize_components().await {
            log::error!("Component initialization failed: {}", e);
            self.coordinator
                .run(
                    ShutdownKind::Shutdown,
                    "initialization failed",
                    ResetAction::None,
                )
                .await;
            return Err(e);
        }
        if let Err(e) = self.start_components().await {
            log::error!("Component start failed: {}", e);
            self.coordinator
                .run(ShutdownKind::Shutdown, "start failed", ResetAction::None)
                .await;
            return Err(e);
        }
        self.initialized = true;

        let (terminal_tx, mut terminal_rx) = mpsc::unbounded_channel::<RunOutcome>();
        let subscriptions = self.subscribe(terminal_tx).await;

        match self
            .orchestrator
            .startup_all(self.config.startup_reason.clone())
            .await
        {
            Ok(issued) => log::info!("Issued startup for {} plugin(s)", issued),
            Err(e) => log::error!("Plugin startup failed: {}", e),
        }

        let supervisor = StartupSupervisor::new(
            self.orchestrator.registry().clone(),
            Arc::clone(&self.scheduler),
        )
        .with_policy(
            self.config.startup_poll_interval,
            self.config.startup_max_attempts,
        );
        let supervisor_task = tokio::spawn(async move { supervisor.wait_until_ready().await });
        self.coordinator.register_task(supervisor_task.abort_handle());

        match supervisor_task.await {
            Ok(StartupOutcome::Ready { attempts }) => {
                log::info!("All enabled plugins ready after {} poll(s)", attempts);
                let configured = self.orchestrator.configure_all().await;
                log::debug!("Configured {} plugin(s)", configured);
                if let Err(e) = self.topology.start_servers().await {
                    log::error!("Cannot start commissioning servers: {}", e);
                    self.coordinator
                        .run(
                            ShutdownKind::Shutdown,
                            "commissioning server start failed",
                            ResetAction::None,
                        )
                        .await;
                }
            }
            Ok(StartupOutcome::Aborted { failed }) => {
                log::error!(
                    "Startup aborted, commissioning servers not started; failed plugins: {}",
                    failed.join(", ")
                );
            }
            Err(e) if e.is_cancelled() => {
                log::debug!("Startup supervisor cancelled");
            }
            Err(e) => {
                log::error!("Startup supervisor task failed: {}", e);
            }
        }

        if self.config.version_checks {
            let checker = UpdateChecker::new(
                self.orchestrator.registry().clone(),
                Arc::clone(&self.packages),
                Arc::clone(&self.scheduler),
            )
            .with_interval(self.config.version_poll_interval);
            let poller = tokio::spawn(async move { checker.run().await });
            self.coordinator.register_task(poller.abort_handle());
        }

        log::info!("{} v{} up", APP_NAME, APP_VERSION);
        let outcome = terminal_rx.recv().await.unwrap_or(RunOutcome::Shutdown);
        log::info!("Run ended with {:?}", outcome);

        for id in subscriptions {
            self.events.unregister_handler(id).await;
        }
        self.stop_components().await;
        self.initialized = false;
        Ok(outcome)
    }

    /// Register the run-scoped event handlers: terminal events feed the run
    /// loop's channel, start requests go to the orchestrator.
    async fn subscribe(&self, terminal_tx: mpsc::UnboundedSender<RunOutcome>) -> Vec<EventId> {
        let mut ids = Vec::new();

        for (kind, outcome) in [
            (EventKind::Shutdown, RunOutcome::Shutdown),
            (EventKind::Restart, RunOutcome::Restart),
            (EventKind::Update, RunOutcome::Update),
        ] {
            let tx = terminal_tx.clone();
            ids.push(
                self.events
                    .register_sync_handler(kind, move |_| {
                        let _ = tx.send(outcome);
                        EventResult::Continue
                    })
                    .await,
            );
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let handler: EventHandlerFn = Box::new(move |event| {
            let orchestrator = Arc::clone(&orchestrator);
            Box::pin(async move {
                if let BridgeEvent::StartDynamicPlatform { plugin, reason } = event {
                    if let Err(e) = orchestrator.start(plugin, Some(reason.clone())).await {
                        log::warn!("Start request for plugin '{}' failed: {}", plugin, e);
                    }
                }
                EventResult::Continue
            })
        });
        ids.push(
            self.events
                .register_handler(EventKind::StartDynamicPlatform, handler)
                .await,
        );

        ids
    }

    async fn initialize_components(&self) -> Result<()> {
        log::debug!("Initializing components");
        let registry = self.dependencies.lock().await;
        for component in registry.components_in_order() {
            log::debug!("Initializing component: {}", component.name());
            component.initialize().await.map_err(|e| {
                Error::lifecycle(
                    KernelLifecyclePhase::Initialize,
                    Some(component.name()),
                    "component failed to initialize",
                    Some(e),
                )
            })?;
        }
        Ok(())
    }

    async fn start_components(&self) -> Result<()> {
        log::debug!("Starting components");
        let registry = self.dependencies.lock().await;
        for component in registry.components_in_order() {
            log::debug!("Starting component: {}", component.name());
            component.start().await.map_err(|e| {
                Error::lifecycle(
                    KernelLifecyclePhase::Start,
                    Some(component.name()),
                    "component failed to start",
                    Some(e),
                )
            })?;
        }
        Ok(())
    }

    /// Stop components in reverse order. The coordinator already flushed
    /// everything that matters, so stop failures only get logged.
    async fn stop_components(&self) {
        log::debug!("Stopping components");
        let registry = self.dependencies.lock().await;
        for component in registry.components_in_order().into_iter().rev() {
            log::debug!("Stopping component: {}", component.name());
            if let Err(e) = component.stop().await {
                log::warn!("Component {} failed to stop: {}", component.name(), e);
            }
        }
    }
}

impl std::fmt::Debug for Hearth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hearth")
            .field("mode", &self.config.mode)
            .field("base_path", &self.config.base_path)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}
