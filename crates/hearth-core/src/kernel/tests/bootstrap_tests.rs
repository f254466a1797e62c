use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::tempdir;

use crate::admin::commands::{AdminQuery, AdminResponse};
use crate::commissioning::engine::{InMemoryEngine, ProtocolEngine};
use crate::commissioning::manager::CommissioningManager;
use crate::device::registry::DeviceManager;
use crate::event::manager::DefaultEventManager;
use crate::kernel::bootstrap::{Hearth, HearthConfig, RunOutcome, default_base_path};
use crate::kernel::component::KernelComponent;
use crate::kernel::constants::{
    BRIDGE_CONFIG_NAME, REGISTRY_NAMESPACE, STARTUP_MAX_ATTEMPTS, STORAGE_DIR_NAME,
};
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::plugin_system::manager::PlatformOrchestrator;
use crate::plugin_system::traits::{
    PlatformError, PlatformFactory, PlatformHandle, PlatformPlugin, PlatformResult, PluginKind,
};
use crate::plugin_system::types::{PluginMetadata, PluginRecord};
use crate::plugin_system::updates::NoopPackageManager;
use crate::shutdown::coordinator::{ResetAction, ShutdownKind};
use crate::shutdown::scheduler::TokioScheduler;
use crate::storage::config::ConfigData;
use crate::storage::manager::DefaultStorageManager;
use crate::topology::error::TopologyError;
use crate::topology::manager::{BridgeMode, TopologyManager};

fn test_config(base_path: PathBuf) -> HearthConfig {
    HearthConfig {
        base_path,
        mode: BridgeMode::Bridge,
        startup_reason: None,
        startup_poll_interval: Duration::from_millis(10),
        startup_max_attempts: 3,
        protocol_flush_delay: Duration::ZERO,
        store_flush_delay: Duration::ZERO,
        version_poll_interval: Duration::from_secs(3600),
        version_checks: false,
    }
}

#[test]
fn test_default_config_matches_constants() {
    let config = HearthConfig::default();
    assert_eq!(config.mode, BridgeMode::Bridge);
    assert_eq!(config.startup_max_attempts, STARTUP_MAX_ATTEMPTS);
    assert!(config.version_checks);
    assert_eq!(config.base_path, default_base_path());
    assert!(default_base_path().ends_with(STORAGE_DIR_NAME));
}

#[test]
fn test_config_load_overlays_persisted_document() -> Result<()> {
    let temp = tempdir().expect("Failed to create temp directory");
    let base = temp.path().join("hearth");
    let storage = DefaultStorageManager::new(base.clone());
    let mut document = ConfigData::new();
    document.set("mode", "childbridge")?;
    document.set("startupMaxAttempts", 5)?;
    document.set("versionChecks", false)?;
    storage.save_app_config(BRIDGE_CONFIG_NAME, &document)?;

    let config = HearthConfig::load(base)?;
    assert_eq!(config.mode, BridgeMode::ChildBridge);
    assert_eq!(config.startup_max_attempts, 5);
    assert!(!config.version_checks);
    Ok(())
}

#[test]
fn test_config_load_defaults_when_absent() -> Result<()> {
    let temp = tempdir().expect("Failed to create temp directory");
    let base = temp.path().join("hearth");

    let config = HearthConfig::load(base.clone())?;
    assert_eq!(config.mode, BridgeMode::Bridge);
    assert_eq!(config.startup_max_attempts, STARTUP_MAX_ATTEMPTS);
    assert!(config.version_checks);
    assert_eq!(config.base_path, base);

    // A zero attempt bound would mean never polling at all; it is clamped.
    let storage = DefaultStorageManager::new(base.clone());
    let mut document = ConfigData::new();
    document.set("startupMaxAttempts", 0)?;
    storage.save_app_config(BRIDGE_CONFIG_NAME, &document)?;
    let config = HearthConfig::load(base)?;
    assert_eq!(config.startup_max_attempts, 1);
    Ok(())
}

#[test]
fn test_config_load_rejects_unknown_mode() -> Result<()> {
    let temp = tempdir().expect("Failed to create temp directory");
    let base = temp.path().join("hearth");
    let storage = DefaultStorageManager::new(base.clone());
    let mut document = ConfigData::new();
    document.set("mode", "gateway")?;
    storage.save_app_config(BRIDGE_CONFIG_NAME, &document)?;

    let result = HearthConfig::load(base);
    assert!(matches!(
        result,
        Err(Error::Topology(TopologyError::UnknownMode(_)))
    ));
    Ok(())
}

#[tokio::test]
async fn test_new_wires_components() {
    let temp = tempdir().expect("Failed to create temp directory");
    let hearth = Hearth::new(test_config(temp.path().join("hearth")));

    assert!(!hearth.is_initialized());
    assert_eq!(hearth.config().mode, BridgeMode::Bridge);

    assert!(hearth.get_component::<DefaultStorageManager>().await.is_some());
    assert!(hearth.get_component::<DefaultEventManager>().await.is_some());
    assert!(hearth.get_component::<CommissioningManager>().await.is_some());
    assert!(hearth.get_component::<DeviceManager>().await.is_some());
    assert!(hearth.get_component::<TopologyManager>().await.is_some());
    assert!(hearth.get_component::<PlatformOrchestrator>().await.is_some());

    #[derive(Debug)]
    struct UnregisteredProbe;

    #[async_trait]
    impl KernelComponent for UnregisteredProbe {
        fn name(&self) -> &'static str {
            "UnregisteredProbe"
        }

        async fn initialize(&self) -> Result<()> {
            Ok(())
        }

        async fn start(&self) -> Result<()> {
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            Ok(())
        }
    }
    assert!(hearth.get_component::<UnregisteredProbe>().await.is_none());
}

#[tokio::test]
async fn test_admin_handler_binds_to_context() -> Result<()> {
    let temp = tempdir().expect("Failed to create temp directory");
    let hearth = Hearth::new(test_config(temp.path().join("hearth")));
    let handler = hearth.admin_handler();

    let response = handler.query(AdminQuery::Settings).await?;
    let AdminResponse::Settings(snapshot) = response else {
        panic!("expected settings payload");
    };
    assert_eq!(snapshot.mode, BridgeMode::Bridge);
    assert_eq!(snapshot.plugin_count, 0);
    assert_eq!(snapshot.device_count, 0);
    Ok(())
}

#[tokio::test]
async fn test_run_until_terminal_event() -> Result<()> {
    let temp = tempdir().expect("Failed to create temp directory");
    let engine = Arc::new(InMemoryEngine::new());
    let mut hearth = Hearth::with_collaborators(
        test_config(temp.path().join("hearth")),
        Arc::clone(&engine) as Arc<dyn ProtocolEngine>,
        Arc::new(NoopPackageManager),
        Arc::new(TokioScheduler),
    );

    let coordinator = hearth.coordinator();
    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        coordinator
            .run(ShutdownKind::Shutdown, "test shutdown", ResetAction::None)
            .await
    });

    let outcome = hearth.run().await?;
    assert_eq!(outcome, RunOutcome::Shutdown);
    assert!(trigger.await.expect("trigger task"));
    assert!(!hearth.is_initialized());
    assert!(engine.operations().contains(&"close_all".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_completed_context_refuses_rerun() -> Result<()> {
    let temp = tempdir().expect("Failed to create temp directory");
    let mut hearth = Hearth::new(test_config(temp.path().join("hearth")));

    let coordinator = hearth.coordinator();
    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        coordinator
            .run(ShutdownKind::Restart, "new build", ResetAction::None)
            .await
    });

    let outcome = hearth.run().await?;
    assert_eq!(outcome, RunOutcome::Restart);
    assert!(trigger.await.expect("trigger task"));

    let again = hearth.run().await;
    assert!(matches!(
        again,
        Err(Error::KernelLifecycleError {
            phase: KernelLifecyclePhase::Run,
            ..
        })
    ));
    Ok(())
}

#[derive(Debug)]
struct FailingPlatform;

#[async_trait]
impl PlatformPlugin for FailingPlatform {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    fn kind(&self) -> PluginKind {
        PluginKind::DynamicPlatform
    }

    async fn on_load(&self, _handle: Arc<PlatformHandle>) -> PlatformResult<()> {
        Ok(())
    }

    async fn on_start(&self, _reason: Option<&str>) -> PlatformResult<()> {
        Err(PlatformError::new("discovery backend unavailable"))
    }

    async fn on_configure(&self) -> PlatformResult<()> {
        Ok(())
    }

    async fn on_shutdown(&self, _reason: Option<&str>) -> PlatformResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_startup_abort_keeps_commissioning_closed() -> Result<()> {
    let temp = tempdir().expect("Failed to create temp directory");
    let engine = Arc::new(InMemoryEngine::new());
    let mut hearth = Hearth::with_collaborators(
        test_config(temp.path().join("hearth")),
        Arc::clone(&engine) as Arc<dyn ProtocolEngine>,
        Arc::new(NoopPackageManager),
        Arc::new(TokioScheduler),
    );
    let factory: PlatformFactory = Arc::new(|| {
        let instance: Arc<dyn PlatformPlugin> = Arc::new(FailingPlatform);
        instance
    });
    hearth
        .orchestrator()
        .register_builtin(
            PluginMetadata::new("broken", "1.0.0", "", "", PluginKind::DynamicPlatform),
            factory,
        )
        .await?;

    let coordinator = hearth.coordinator();
    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        coordinator
            .run(ShutdownKind::Shutdown, "test shutdown", ResetAction::None)
            .await
    });

    let outcome = hearth.run().await?;
    assert_eq!(outcome, RunOutcome::Shutdown);
    assert!(trigger.await.expect("trigger task"));

    // The aborted startup must leave every commissioning server closed.
    let starts = engine
        .operations()
        .iter()
        .filter(|op| op.starts_with("start_server"))
        .count();
    assert_eq!(starts, 0);

    // The persisted snapshot carries the latched error flag.
    let records: Option<Vec<PluginRecord>> = hearth
        .storage()
        .context(REGISTRY_NAMESPACE)?
        .get("registered")?;
    let records = records.expect("plugin snapshot persisted");
    assert_eq!(records.len(), 1);
    assert!(records[0].error);
    Ok(())
}
