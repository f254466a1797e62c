use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::{TempDir, tempdir};

use crate::admin::commands::{AdminCommand, AdminQuery, AdminResponse};
use crate::admin::error::AdminError;
use crate::admin::handler::AdminHandler;
use crate::commissioning::engine::{InMemoryEngine, ProtocolEngine};
use crate::commissioning::manager::CommissioningManager;
use crate::device::error::DeviceSystemError;
use crate::device::registry::{DeviceManager, PersistedDevice};
use crate::device::types::{BasicInformation, BridgedDevice, ClusterSnapshot};
use crate::event::manager::DefaultEventManager;
use crate::event::types::{BridgeEvent, EventKind, EventResult};
use crate::kernel::constants::{APP_NAME, APP_VERSION, DEVICE_NAMESPACE, ROOT_IDENTITY_KEY};
use crate::kernel::error::{Error, Result};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::loader::{MANIFEST_FILE, PluginLoader};
use crate::plugin_system::manager::{PlatformOrchestrator, create_shared_registry};
use crate::plugin_system::registry::SharedPluginRegistry;
use crate::plugin_system::traits::PluginKind;
use crate::plugin_system::types::{PluginMetadata, PluginRecord};
use crate::plugin_system::updates::PackageManager;
use crate::shutdown::coordinator::ShutdownCoordinator;
use crate::shutdown::scheduler::TokioScheduler;
use crate::storage::config::{CONFIG_KEY_NAME, ConfigData};
use crate::storage::error::StorageSystemError;
use crate::storage::manager::DefaultStorageManager;
use crate::topology::manager::{BridgeMode, TopologyManager};

/// Package manager double that accepts installs and remembers them.
#[derive(Debug, Default)]
struct RecordingPackageManager {
    installs: StdMutex<Vec<(String, Option<String>)>>,
}

impl RecordingPackageManager {
    fn recorded(&self) -> Vec<(String, Option<String>)> {
        self.installs.lock().map(|i| i.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PackageManager for RecordingPackageManager {
    async fn install(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> std::result::Result<(), PluginSystemError> {
        if let Ok(mut installs) = self.installs.lock() {
            installs.push((name.to_string(), version.map(String::from)));
        }
        Ok(())
    }

    async fn latest_version(
        &self,
        _name: &str,
    ) -> std::result::Result<Option<String>, PluginSystemError> {
        Ok(None)
    }
}

struct TestBed {
    handler: AdminHandler,
    coordinator: Arc<ShutdownCoordinator>,
    topology: Arc<TopologyManager>,
    registry: SharedPluginRegistry,
    devices: DeviceManager,
    engine: Arc<InMemoryEngine>,
    storage: Arc<DefaultStorageManager>,
    commissioning: Arc<CommissioningManager>,
    events: DefaultEventManager,
    packages: Arc<RecordingPackageManager>,
    temp: TempDir,
}

fn create_test_bed() -> TestBed {
    let temp = tempdir().expect("Failed to create temp directory");
    let storage = Arc::new(DefaultStorageManager::new(temp.path().join("hearth")));
    storage.ensure_directories().expect("storage skeleton");

    let registry = create_shared_registry();
    let devices = DeviceManager::new();
    let commissioning = Arc::new(CommissioningManager::new(Arc::clone(&storage)));
    let engine = Arc::new(InMemoryEngine::new());
    let topology = Arc::new(TopologyManager::new(
        BridgeMode::Bridge,
        Arc::clone(&engine) as Arc<dyn ProtocolEngine>,
        Arc::clone(&commissioning),
        devices.clone(),
        registry.clone(),
        Arc::clone(&storage),
    ));
    let orchestrator = Arc::new(PlatformOrchestrator::new(
        registry.clone(),
        Arc::new(PluginLoader::new()),
        Arc::clone(&storage),
        Arc::clone(&topology),
    ));
    let events = DefaultEventManager::new();
    let coordinator = Arc::new(
        ShutdownCoordinator::new(
            Arc::clone(&orchestrator),
            Arc::clone(&engine) as Arc<dyn ProtocolEngine>,
            Arc::clone(&storage),
            devices.clone(),
            events.clone(),
            Arc::new(TokioScheduler),
        )
        .with_delays(Duration::ZERO, Duration::ZERO),
    );
    let packages = Arc::new(RecordingPackageManager::default());
    let handler = AdminHandler::new(
        orchestrator,
        Arc::clone(&coordinator),
        Arc::clone(&topology),
        devices.clone(),
        Arc::clone(&packages) as Arc<dyn PackageManager>,
    );

    TestBed {
        handler,
        coordinator,
        topology,
        registry,
        devices,
        engine,
        storage,
        commissioning,
        events,
        packages,
        temp,
    }
}

async fn register_plugin(registry: &SharedPluginRegistry, name: &str, kind: PluginKind) {
    let mut record = PluginRecord::new(PluginMetadata::new(name, "1.0.0", "", "", kind), None);
    record.mark_loaded();
    let mut guard = registry.lock().await;
    guard.register(record).expect("register plugin record");
}

fn device(name: &str, unique: &str) -> Arc<BridgedDevice> {
    Arc::new(BridgedDevice::new(
        name,
        0x0100,
        BasicInformation {
            vendor_id: 0x1234,
            vendor_name: "Vendor".to_string(),
            product_id: 0x0001,
            product_name: name.to_string(),
            serial_number: format!("S-{unique}"),
            unique_id: unique.to_string(),
            software_version: 1,
            software_version_string: "1.0.0".to_string(),
            hardware_version: 1,
            hardware_version_string: "1.0".to_string(),
        },
    ))
}

#[tokio::test]
async fn test_addplugin_registers_from_manifest() -> Result<()> {
    let bed = create_test_bed();
    let dir = bed.temp.path().join("shade");
    std::fs::create_dir_all(&dir)?;
    std::fs::write(
        dir.join(MANIFEST_FILE),
        r#"{"name": "shade", "version": "0.3.0", "kind": "DynamicPlatform"}"#,
    )?;

    let response = bed
        .handler
        .execute(AdminCommand::AddPlugin { path: dir.clone() })
        .await?;
    assert!(matches!(response, AdminResponse::Ack));
    {
        let registry = bed.registry.lock().await;
        let record = &registry.get("shade").expect("shade registered").record;
        assert_eq!(record.version, "0.3.0");
        assert_eq!(record.kind, PluginKind::DynamicPlatform);
        assert_eq!(record.path.as_deref(), Some(dir.as_path()));
    }

    let again = bed
        .handler
        .execute(AdminCommand::AddPlugin { path: dir })
        .await;
    assert!(matches!(
        again,
        Err(Error::PluginSystem(PluginSystemError::AlreadyRegistered { .. }))
    ));
    Ok(())
}

#[tokio::test]
async fn test_toggle_and_remove_verbs() -> Result<()> {
    let bed = create_test_bed();
    register_plugin(&bed.registry, "hue", PluginKind::DynamicPlatform).await;

    bed.handler
        .execute(AdminCommand::DisablePlugin { name: "hue".to_string() })
        .await?;
    {
        let registry = bed.registry.lock().await;
        assert!(!registry.get("hue").expect("hue registered").record.enabled);
    }

    bed.handler
        .execute(AdminCommand::EnablePlugin { name: "hue".to_string() })
        .await?;
    {
        let registry = bed.registry.lock().await;
        assert!(registry.get("hue").expect("hue registered").record.enabled);
    }

    bed.handler
        .execute(AdminCommand::RemovePlugin { name: "hue".to_string() })
        .await?;
    assert!(bed.registry.lock().await.get("hue").is_none());

    let missing = bed
        .handler
        .execute(AdminCommand::EnablePlugin { name: "ghost".to_string() })
        .await;
    assert!(matches!(
        missing,
        Err(Error::PluginSystem(PluginSystemError::NotRegistered { .. }))
    ));
    Ok(())
}

#[tokio::test]
async fn test_saveconfig_checks_identity() -> Result<()> {
    let bed = create_test_bed();
    register_plugin(&bed.registry, "hue", PluginKind::DynamicPlatform).await;

    let mut wrong = ConfigData::new();
    wrong.set(CONFIG_KEY_NAME, "zig")?;
    let rejected = bed
        .handler
        .execute(AdminCommand::SaveConfig {
            name: "hue".to_string(),
            config: wrong,
        })
        .await;
    assert!(matches!(
        rejected,
        Err(Error::StorageSystem(StorageSystemError::ConfigIdentityMismatch { .. }))
    ));

    let mut good = ConfigData::new();
    good.set("level", 4)?;
    let response = bed
        .handler
        .execute(AdminCommand::SaveConfig {
            name: "hue".to_string(),
            config: good,
        })
        .await?;
    assert!(matches!(response, AdminResponse::Ack));

    // The stored document got the identity and toggle defaults filled in.
    let stored = bed
        .storage
        .plugin_config("hue", PluginKind::DynamicPlatform.as_str())?;
    assert_eq!(stored.get::<i64>("level"), Some(4));
    assert_eq!(stored.get::<String>(CONFIG_KEY_NAME).as_deref(), Some("hue"));
    Ok(())
}

#[tokio::test]
async fn test_installplugin_delegates_to_package_manager() -> Result<()> {
    let bed = create_test_bed();
    let response = bed
        .handler
        .execute(AdminCommand::InstallPlugin {
            name: "hue".to_string(),
            version: Some("2.0.0".to_string()),
        })
        .await?;
    assert!(matches!(response, AdminResponse::Ack));
    assert_eq!(
        bed.packages.recorded(),
        vec![("hue".to_string(), Some("2.0.0".to_string()))]
    );
    Ok(())
}

#[tokio::test]
async fn test_settings_query_reports_bridge_state() -> Result<()> {
    let bed = create_test_bed();
    register_plugin(&bed.registry, "hue", PluginKind::DynamicPlatform).await;
    bed.topology.add_device("hue", device("Lamp", "u-1")).await?;

    let response = bed.handler.query(AdminQuery::Settings).await?;
    let AdminResponse::Settings(snapshot) = response else {
        panic!("expected settings payload");
    };
    assert_eq!(snapshot.name, APP_NAME);
    assert_eq!(snapshot.version, APP_VERSION);
    assert_eq!(snapshot.mode, BridgeMode::Bridge);
    assert!(!snapshot.started);
    assert_eq!(snapshot.qr_pairing_code, None);
    assert_eq!(snapshot.plugin_count, 1);
    assert_eq!(snapshot.device_count, 1);
    Ok(())
}

#[tokio::test]
async fn test_plugin_and_device_queries() -> Result<()> {
    let bed = create_test_bed();
    register_plugin(&bed.registry, "hue", PluginKind::DynamicPlatform).await;
    let lamp = BridgedDevice::new(
        "Lamp",
        0x0100,
        BasicInformation {
            vendor_id: 0x1234,
            vendor_name: "Vendor".to_string(),
            product_id: 0x0001,
            product_name: "Lamp".to_string(),
            serial_number: "S-u-1".to_string(),
            unique_id: "u-1".to_string(),
            software_version: 1,
            software_version_string: "1.0.0".to_string(),
            hardware_version: 1,
            hardware_version_string: "1.0".to_string(),
        },
    )
    .with_clusters(vec![ClusterSnapshot {
        cluster_id: 6,
        cluster_name: "OnOff".to_string(),
        attributes: json!({"on": true}),
    }]);
    bed.topology.add_device("hue", Arc::new(lamp)).await?;

    let response = bed.handler.query(AdminQuery::Plugins).await?;
    let AdminResponse::Plugins(records) = response else {
        panic!("expected plugins payload");
    };
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "hue");
    assert_eq!(records[0].registered_devices, Some(1));

    let response = bed.handler.query(AdminQuery::Devices).await?;
    let AdminResponse::Devices(rows) = response else {
        panic!("expected devices payload");
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].plugin, "hue");
    assert_eq!(rows[0].unique_id, "u-1");
    assert_eq!(rows[0].cluster_count, 1);

    let response = bed
        .handler
        .query(AdminQuery::DeviceClusters {
            plugin: "hue".to_string(),
            unique_id: "u-1".to_string(),
        })
        .await?;
    let AdminResponse::DeviceClusters(clusters) = response else {
        panic!("expected clusters payload");
    };
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].cluster_name, "OnOff");

    let missing = bed
        .handler
        .query(AdminQuery::DeviceClusters {
            plugin: "hue".to_string(),
            unique_id: "ghost".to_string(),
        })
        .await;
    assert!(matches!(
        missing,
        Err(Error::DeviceSystem(DeviceSystemError::DeviceNotFound { .. }))
    ));
    Ok(())
}

#[tokio::test]
async fn test_terminal_verbs_reject_reentry() -> Result<()> {
    let bed = create_test_bed();
    let seen: Arc<StdMutex<Vec<BridgeEvent>>> = Arc::new(StdMutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        bed.events
            .register_sync_handler(EventKind::Shutdown, move |event| {
                if let Ok(mut seen) = seen.lock() {
                    seen.push(event.clone());
                }
                EventResult::Continue
            })
            .await;
    }

    let response = bed
        .handler
        .execute(AdminCommand::Shutdown { reason: None })
        .await?;
    assert!(matches!(response, AdminResponse::Ack));
    assert!(bed.coordinator.in_progress());
    {
        let seen = seen.lock().expect("event log lock");
        assert_eq!(
            *seen,
            vec![BridgeEvent::Shutdown {
                reason: "shutdown requested".to_string(),
            }]
        );
    }

    let again = bed
        .handler
        .execute(AdminCommand::Restart {
            reason: Some("too late".to_string()),
        })
        .await;
    assert!(matches!(again, Err(Error::Admin(AdminError::Rejected { .. }))));
    Ok(())
}

#[tokio::test]
async fn test_reset_wipes_identities() -> Result<()> {
    let bed = create_test_bed();
    register_plugin(&bed.registry, "hue", PluginKind::DynamicPlatform).await;
    bed.topology.add_device("hue", device("Lamp", "u-1")).await?;
    assert!(bed.commissioning.get(ROOT_IDENTITY_KEY)?.is_some());

    let response = bed.handler.execute(AdminCommand::Reset).await?;
    assert!(matches!(response, AdminResponse::Ack));
    assert!(bed.coordinator.in_progress());
    assert!(bed.commissioning.get(ROOT_IDENTITY_KEY)?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_unregister_detaches_devices_before_terminating() -> Result<()> {
    let bed = create_test_bed();
    register_plugin(&bed.registry, "hue", PluginKind::DynamicPlatform).await;
    register_plugin(&bed.registry, "zig", PluginKind::DynamicPlatform).await;
    bed.topology.add_device("hue", device("Lamp", "u-1")).await?;
    bed.topology.add_device("hue", device("Strip", "u-2")).await?;
    bed.topology.add_device("zig", device("Sensor", "u-3")).await?;

    let response = bed.handler.execute(AdminCommand::Unregister).await?;
    assert!(matches!(response, AdminResponse::Ack));
    assert!(bed.coordinator.in_progress());

    // Every endpoint came off the fabric before the engine closed.
    let ops = bed.engine.operations();
    let detaches = ops.iter().filter(|op| op.starts_with("detach:")).count();
    assert_eq!(detaches, 3);
    assert_eq!(ops.last().map(String::as_str), Some("close_all"));

    // The persisted device snapshot reflects the emptied registry.
    let persisted: Option<Vec<PersistedDevice>> =
        bed.storage.context(DEVICE_NAMESPACE)?.get(DEVICE_NAMESPACE)?;
    assert_eq!(persisted.expect("device snapshot persisted").len(), 0);
    assert_eq!(bed.devices.device_count().await, 0);
    Ok(())
}
