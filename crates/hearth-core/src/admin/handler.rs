use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::admin::commands::{
    AdminCommand, AdminQuery, AdminResponse, DeviceSummary, SettingsSnapshot,
};
use crate::admin::error::AdminError;
use crate::device::error::DeviceSystemError;
use crate::device::registry::DeviceManager;
use crate::kernel::constants::{APP_NAME, APP_VERSION};
use crate::kernel::error::Result;
use crate::plugin_system::manager::PlatformOrchestrator;
use crate::plugin_system::registry::SharedPluginRegistry;
use crate::plugin_system::updates::PackageManager;
use crate::shutdown::coordinator::{ResetAction, ShutdownCoordinator, ShutdownKind};
use crate::topology::manager::TopologyManager;

/// A network surface (HTTP listener, realtime push channel) serving the
/// admin API. The coordinator closes every registered listener while
/// draining; implementations drop their event subscriptions in `close`.
#[async_trait]
pub trait AdminListener: Send + Sync {
    async fn close(&self);
}

/// Maps admin verbs and queries onto orchestrator, topology and coordinator
/// operations. Stateless; frontends hold it behind an `Arc` and call
/// [`execute`](Self::execute) / [`query`](Self::query).
#[derive(Clone)]
pub struct AdminHandler {
    orchestrator: Arc<PlatformOrchestrator>,
    coordinator: Arc<ShutdownCoordinator>,
    topology: Arc<TopologyManager>,
    registry: SharedPluginRegistry,
    devices: DeviceManager,
    packages: Arc<dyn PackageManager>,
}

impl AdminHandler {
    pub fn new(
        orchestrator: Arc<PlatformOrchestrator>,
        coordinator: Arc<ShutdownCoordinator>,
        topology: Arc<TopologyManager>,
        devices: DeviceManager,
        packages: Arc<dyn PackageManager>,
    ) -> Self {
        let registry = orchestrator.registry().clone();
        Self {
            orchestrator,
            coordinator,
            topology,
            registry,
            devices,
            packages,
        }
    }

    /// Run one mutating verb. Errors from the underlying subsystem come back
    /// as-is; the terminal verbs additionally reject re-entry while a
    /// shutdown is already in progress.
    pub async fn execute(&self, command: AdminCommand) -> Result<AdminResponse> {
        log::info!("Admin command '{}'", command.verb());
        match command {
            AdminCommand::AddPlugin { path } => {
                let name = self.orchestrator.add(&path).await?;
                log::info!("Admin added plugin '{name}' from {}", path.display());
                Ok(AdminResponse::Ack)
            }
            AdminCommand::RemovePlugin { name } => {
                self.orchestrator.remove(&name).await?;
                Ok(AdminResponse::Ack)
            }
            AdminCommand::EnablePlugin { name } => {
                self.orchestrator.enable(&name).await?;
                Ok(AdminResponse::Ack)
            }
            AdminCommand::DisablePlugin { name } => {
                self.orchestrator.disable(&name).await?;
                Ok(AdminResponse::Ack)
            }
            AdminCommand::SaveConfig { name, config } => {
                self.orchestrator.save_config(&name, config).await?;
                Ok(AdminResponse::Ack)
            }
            AdminCommand::InstallPlugin { name, version } => {
                self.packages.install(&name, version.as_deref()).await?;
                Ok(AdminResponse::Ack)
            }
            AdminCommand::Shutdown { reason } => {
                let reason = reason.unwrap_or_else(|| "shutdown requested".to_string());
                self.terminate("shutdown", ShutdownKind::Shutdown, &reason, ResetAction::None)
                    .await
            }
            AdminCommand::Restart { reason } => {
                let reason = reason.unwrap_or_else(|| "restart requested".to_string());
                self.terminate("restart", ShutdownKind::Restart, &reason, ResetAction::None)
                    .await
            }
            AdminCommand::Update { reason } => {
                let reason = reason.unwrap_or_else(|| "update requested".to_string());
                self.terminate("update", ShutdownKind::Update, &reason, ResetAction::None)
                    .await
            }
            AdminCommand::Reset => {
                self.terminate(
                    "reset",
                    ShutdownKind::Shutdown,
                    "commissioning reset requested",
                    ResetAction::Commissioning,
                )
                .await
            }
            AdminCommand::FactoryReset => {
                self.terminate(
                    "factoryreset",
                    ShutdownKind::Shutdown,
                    "factory reset requested",
                    ResetAction::Factory,
                )
                .await
            }
            AdminCommand::Unregister => {
                let names = {
                    let registry = self.registry.lock().await;
                    registry.names()
                };
                let mut removed = 0;
                for name in names {
                    removed += self.topology.remove_all_for_plugin(&name).await?;
                }
                log::info!("Admin unregistered {removed} bridged device(s)");
                self.terminate(
                    "unregister",
                    ShutdownKind::Shutdown,
                    "all bridged devices unregistered",
                    ResetAction::None,
                )
                .await
            }
        }
    }

    /// Serve one read-only query from the live registries.
    pub async fn query(&self, query: AdminQuery) -> Result<AdminResponse> {
        log::debug!("Admin query '{}'", query.name());
        match query {
            AdminQuery::Settings => {
                let summary = self.topology.summary().await;
                let plugin_count = {
                    let registry = self.registry.lock().await;
                    registry.len()
                };
                let device_count = self.devices.device_count().await;
                Ok(AdminResponse::Settings(SettingsSnapshot {
                    name: APP_NAME.to_string(),
                    version: APP_VERSION.to_string(),
                    mode: summary.mode,
                    started: summary.started,
                    qr_pairing_code: summary.qr_pairing_code,
                    manual_pairing_code: summary.manual_pairing_code,
                    paired: summary.paired,
                    connected: summary.connected,
                    plugin_count,
                    device_count,
                }))
            }
            AdminQuery::Plugins => {
                let registry = self.registry.lock().await;
                Ok(AdminResponse::Plugins(registry.records()))
            }
            AdminQuery::Devices => {
                let rows = self
                    .devices
                    .snapshot()
                    .await
                    .into_iter()
                    .map(|entry| DeviceSummary {
                        plugin: entry.plugin,
                        name: entry.device.name.clone(),
                        device_type: entry.device.device_type,
                        unique_id: entry.device.basic_information.unique_id.clone(),
                        serial_number: entry.device.basic_information.serial_number.clone(),
                        vendor_name: entry.device.basic_information.vendor_name.clone(),
                        product_name: entry.device.basic_information.product_name.clone(),
                        cluster_count: entry.device.clusters.len(),
                    })
                    .collect();
                Ok(AdminResponse::Devices(rows))
            }
            AdminQuery::DeviceClusters { plugin, unique_id } => {
                let device = self
                    .devices
                    .devices_for_plugin(&plugin)
                    .await
                    .into_iter()
                    .find(|device| device.unique_id() == unique_id)
                    .ok_or(DeviceSystemError::DeviceNotFound {
                        plugin,
                        unique_id,
                    })?;
                Ok(AdminResponse::DeviceClusters(device.clusters.clone()))
            }
        }
    }

    async fn terminate(
        &self,
        verb: &str,
        kind: ShutdownKind,
        reason: &str,
        reset: ResetAction,
    ) -> Result<AdminResponse> {
        if self.coordinator.run(kind, reason, reset).await {
            Ok(AdminResponse::Ack)
        } else {
            Err(AdminError::Rejected {
                command: verb.to_string(),
                reason: "shutdown already in progress".to_string(),
            }
            .into())
        }
    }
}

impl fmt::Debug for AdminHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminHandler").finish_non_exhaustive()
    }
}
