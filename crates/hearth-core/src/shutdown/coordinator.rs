//! # Hearth Core Shutdown Coordinator
//!
//! Runs the ordered teardown every exit path funnels through: operator
//! shutdown, restart, update, commissioning reset and factory reset all
//! execute the same four phases, differing only in the terminal event and
//! the destructive action at the end.
//!
//! The phases are `Draining` (stop timers, run plugin shutdown hooks, close
//! admin listeners), `FlushingProtocol` (close the commissioning servers),
//! `FlushingStore` (persist device and plugin state, close storage) and
//! `Finalizing` (optional destructive reset, then emit exactly one terminal
//! event). Two settle delays separate the phases so in-flight protocol
//! traffic and file writes drain before the next phase invalidates them.
//!
//! At most one cleanup runs per process; later calls are logged no-ops.
//! Failures inside the coordinator are logged and swallowed, never
//! propagated: by the time it runs there is nothing useful left to abort
//! into.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::task::AbortHandle;

use crate::admin::handler::AdminListener;
use crate::commissioning::engine::ProtocolEngine;
use crate::device::registry::DeviceManager;
use crate::event::manager::{DefaultEventManager, EventManager};
use crate::event::types::BridgeEvent;
use crate::kernel::constants::{
    DEVICE_NAMESPACE, IDENTITY_NAMESPACE, PROTOCOL_FLUSH_DELAY_MS, STORE_FLUSH_DELAY_MS,
};
use crate::plugin_system::manager::PlatformOrchestrator;
use crate::shutdown::scheduler::Scheduler;
use crate::storage::manager::DefaultStorageManager;

/// Which terminal event the run loop receives once cleanup finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownKind {
    Shutdown,
    Restart,
    Update,
}

impl ShutdownKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownKind::Shutdown => "shutdown",
            ShutdownKind::Restart => "restart",
            ShutdownKind::Update => "update",
        }
    }
}

impl fmt::Display for ShutdownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destructive action performed in the finalizing phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetAction {
    /// Keep all state.
    None,
    /// Delete the commissioning identities; controllers will see new
    /// devices on the next run.
    Commissioning,
    /// Delete the whole storage directory.
    Factory,
}

/// Where the coordinator currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Idle,
    Draining,
    FlushingProtocol,
    FlushingStore,
    Finalizing,
    Complete,
}

/// Ordered teardown of one bridge run.
pub struct ShutdownCoordinator {
    running: AtomicBool,
    phase: StdMutex<ShutdownPhase>,
    orchestrator: Arc<PlatformOrchestrator>,
    engine: Arc<dyn ProtocolEngine>,
    storage: Arc<DefaultStorageManager>,
    devices: DeviceManager,
    events: DefaultEventManager,
    scheduler: Arc<dyn Scheduler>,
    protocol_flush_delay: Duration,
    store_flush_delay: Duration,
    tasks: StdMutex<Vec<AbortHandle>>,
    listeners: StdMutex<Vec<Arc<dyn AdminListener>>>,
}

impl ShutdownCoordinator {
    pub fn new(
        orchestrator: Arc<PlatformOrchestrator>,
        engine: Arc<dyn ProtocolEngine>,
        storage: Arc<DefaultStorageManager>,
        devices: DeviceManager,
        events: DefaultEventManager,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        ShutdownCoordinator {
            running: AtomicBool::new(false),
            phase: StdMutex::new(ShutdownPhase::Idle),
            orchestrator,
            engine,
            storage,
            devices,
            events,
            scheduler,
            protocol_flush_delay: Duration::from_millis(PROTOCOL_FLUSH_DELAY_MS),
            store_flush_delay: Duration::from_millis(STORE_FLUSH_DELAY_MS),
            tasks: StdMutex::new(Vec::new()),
            listeners: StdMutex::new(Vec::new()),
        }
    }

    /// Override the two settle delays.
    pub fn with_delays(mut self, protocol_flush: Duration, store_flush: Duration) -> Self {
        self.protocol_flush_delay = protocol_flush;
        self.store_flush_delay = store_flush;
        self
    }

    /// Register a background task (signal handler, poller, supervisor) to
    /// abort during draining.
    pub fn register_task(&self, handle: AbortHandle) {
        match self.tasks.lock() {
            Ok(mut tasks) => tasks.push(handle),
            Err(poisoned) => poisoned.into_inner().push(handle),
        }
    }

    /// Register an admin listener to close during draining.
    pub fn register_listener(&self, listener: Arc<dyn AdminListener>) {
        match self.listeners.lock() {
            Ok(mut listeners) => listeners.push(listener),
            Err(poisoned) => poisoned.into_inner().push(listener),
        }
    }

    /// Current phase, for observers and tests.
    pub fn phase(&self) -> ShutdownPhase {
        match self.phase.lock() {
            Ok(phase) => *phase,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Whether a cleanup has been claimed already.
    pub fn in_progress(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the full teardown. Returns `false` when another cleanup already
    /// claimed the process, in which case nothing is done.
    pub async fn run(&self, kind: ShutdownKind, reason: &str, reset: ResetAction) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            log::info!("Cleanup already in progress, ignoring {} request", kind);
            return false;
        }
        log::info!("Coordinated {} starting: {}", kind, reason);

        self.set_phase(ShutdownPhase::Draining);
        self.abort_registered_tasks();
        let composite = format!("{}: {}", kind, reason);
        let hooks = self.orchestrator.run_shutdown_hooks(&composite).await;
        log::debug!("Ran {} plugin shutdown hook(s)", hooks);
        self.close_listeners().await;

        self.scheduler.sleep(self.protocol_flush_delay).await;

        self.set_phase(ShutdownPhase::FlushingProtocol);
        if let Err(e) = self.engine.close_all().await {
            log::warn!("Failed to close protocol engine: {}", e);
        }

        self.set_phase(ShutdownPhase::FlushingStore);
        self.flush_store().await;

        self.scheduler.sleep(self.store_flush_delay).await;

        self.set_phase(ShutdownPhase::Finalizing);
        self.apply_reset(reset);
        let event = match kind {
            ShutdownKind::Shutdown => BridgeEvent::Shutdown {
                reason: reason.to_string(),
            },
            ShutdownKind::Restart => BridgeEvent::Restart {
                reason: reason.to_string(),
            },
            ShutdownKind::Update => BridgeEvent::Update {
                reason: reason.to_string(),
            },
        };
        self.events.dispatch(&event).await;
        self.set_phase(ShutdownPhase::Complete);
        log::info!("Coordinated {} complete", kind);
        true
    }

    fn abort_registered_tasks(&self) {
        let handles: Vec<AbortHandle> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        let count = handles.len();
        for handle in handles {
            handle.abort();
        }
        if count > 0 {
            log::debug!("Aborted {} background task(s)", count);
        }
    }

    async fn close_listeners(&self) {
        let listeners: Vec<Arc<dyn AdminListener>> = match self.listeners.lock() {
            Ok(mut listeners) => listeners.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for listener in listeners {
            listener.close().await;
        }
    }

    async fn flush_store(&self) {
        match self.storage.context(DEVICE_NAMESPACE) {
            Ok(context) => {
                if let Err(e) = self.devices.persist_to(&context).await {
                    log::warn!("Failed to persist device registry: {}", e);
                }
            }
            Err(e) => log::warn!("Failed to open device namespace: {}", e),
        }
        if let Err(e) = self.orchestrator.persist_snapshot().await {
            log::warn!("Failed to persist plugin registry snapshot: {}", e);
        }
        if let Err(e) = self.storage.close_contexts() {
            log::warn!("Failed to close storage contexts: {}", e);
        }
        self.devices.clear().await;
        {
            let mut registry = self.orchestrator.registry().lock().await;
            registry.clear();
        }
    }

    fn apply_reset(&self, reset: ResetAction) {
        match reset {
            ResetAction::None => {}
            ResetAction::Commissioning => match self.storage.wipe_context(IDENTITY_NAMESPACE) {
                Ok(()) => log::info!("Commissioning identities wiped"),
                Err(e) => log::warn!("Failed to wipe commissioning identities: {}", e),
            },
            ResetAction::Factory => match self.storage.wipe_all() {
                Ok(()) => log::info!("Storage directory reset to factory state"),
                Err(e) => log::warn!("Failed to reset storage directory: {}", e),
            },
        }
    }

    fn set_phase(&self, next: ShutdownPhase) {
        match self.phase.lock() {
            Ok(mut phase) => *phase = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        log::debug!("Shutdown phase: {:?}", next);
    }
}

impl fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("running", &self.running.load(Ordering::SeqCst))
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
