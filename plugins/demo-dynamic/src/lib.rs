//! Demo dynamic platform: bridges a configurable number of lights.
//!
//! Exercises the aggregator path: as a `DynamicPlatform` all of its devices
//! hang off one aggregator, shared in bridge mode or dedicated in childbridge
//! mode. The crate builds both as an rlib the binary links for the built-in
//! factory table and as a cdylib the loader can pull in through the entry
//! symbols, with `hearth.plugin.json` next to it as the manifest.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use hearth_core::export_platform;
use hearth_core::{
    BasicInformation, BridgedDevice, ClusterSnapshot, PlatformError, PlatformHandle,
    PlatformPlugin, PlatformResult, PluginKind, PluginMetadata,
};

pub const PLUGIN_NAME: &str = "demo-dynamic";

// Matter on/off light device type and its OnOff cluster.
const ON_OFF_LIGHT_DEVICE_TYPE: u32 = 0x0100;
const ON_OFF_CLUSTER_ID: u32 = 0x0006;

const DEFAULT_DEVICE_COUNT: usize = 2;

/// Registration metadata for the built-in factory table. The dynamic load
/// path reads the same values from `hearth.plugin.json` instead.
pub fn metadata() -> PluginMetadata {
    PluginMetadata::new(
        PLUGIN_NAME,
        env!("CARGO_PKG_VERSION"),
        "Bridges a configurable set of demo lights",
        "Hearth Developers",
        PluginKind::DynamicPlatform,
    )
}

#[derive(Debug, Default)]
pub struct DemoDynamicPlatform {
    handle: StdMutex<Option<Arc<PlatformHandle>>>,
}

impl DemoDynamicPlatform {
    fn store_handle(&self, handle: Arc<PlatformHandle>) {
        match self.handle.lock() {
            Ok(mut guard) => *guard = Some(handle),
            Err(poisoned) => *poisoned.into_inner() = Some(handle),
        }
    }

    fn handle(&self) -> Option<Arc<PlatformHandle>> {
        match self.handle.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn light(&self, index: usize) -> BridgedDevice {
        let serial = format!("DL-{index:04}");
        BridgedDevice::new(
            format!("Demo Light {index}"),
            ON_OFF_LIGHT_DEVICE_TYPE,
            BasicInformation {
                vendor_id: 0xfff1,
                vendor_name: "Hearth Demo".to_string(),
                product_id: 0x8002,
                product_name: "Demo Light".to_string(),
                serial_number: serial.clone(),
                unique_id: format!("{PLUGIN_NAME}-{serial}"),
                software_version: 1,
                software_version_string: env!("CARGO_PKG_VERSION").to_string(),
                hardware_version: 1,
                hardware_version_string: "demo".to_string(),
            },
        )
        .with_clusters(vec![ClusterSnapshot {
            cluster_id: ON_OFF_CLUSTER_ID,
            cluster_name: "OnOff".to_string(),
            attributes: serde_json::json!({ "onOff": false }),
        }])
    }
}

#[async_trait]
impl PlatformPlugin for DemoDynamicPlatform {
    fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn kind(&self) -> PluginKind {
        PluginKind::DynamicPlatform
    }

    async fn on_load(&self, handle: Arc<PlatformHandle>) -> PlatformResult<()> {
        log::info!(target: handle.log_target(), "Demo dynamic platform loaded");
        self.store_handle(handle);
        Ok(())
    }

    async fn on_start(&self, reason: Option<&str>) -> PlatformResult<()> {
        let Some(handle) = self.handle() else {
            return Err(PlatformError::new("start hook invoked before load"));
        };
        if let Some(reason) = reason {
            log::info!(target: handle.log_target(), "Starting ({})", reason);
        }

        let count: usize = handle
            .config_value("deviceCount")
            .unwrap_or(DEFAULT_DEVICE_COUNT);
        for index in 1..=count {
            handle.register_device(self.light(index)).await?;
        }
        log::info!(target: handle.log_target(), "Registered {} light(s)", count);
        Ok(())
    }

    async fn on_configure(&self) -> PlatformResult<()> {
        if let Some(handle) = self.handle() {
            log::info!(target: handle.log_target(), "Demo dynamic platform configured");
        }
        Ok(())
    }

    async fn on_shutdown(&self, reason: Option<&str>) -> PlatformResult<()> {
        if let Some(handle) = self.handle() {
            log::info!(
                target: handle.log_target(),
                "Demo dynamic platform shutting down ({})",
                reason.unwrap_or("no reason given")
            );
        }
        Ok(())
    }
}

export_platform!(DemoDynamicPlatform);
