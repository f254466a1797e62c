//! Demo accessory platform: bridges exactly one contact sensor.
//!
//! The smallest useful [`PlatformPlugin`]: it holds on to the handle it is
//! given in `on_load` and registers a single device in `on_start`. Because
//! its kind is `AccessoryPlatform`, a childbridge run gives the sensor its
//! own commissioning server with an identity imported from the device.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use hearth_core::{
    BasicInformation, BridgedDevice, ClusterSnapshot, PlatformError, PlatformHandle,
    PlatformPlugin, PlatformResult, PluginKind, PluginMetadata,
};

pub const PLUGIN_NAME: &str = "demo-accessory";

// Matter contact sensor device type and its BooleanState cluster.
const CONTACT_SENSOR_DEVICE_TYPE: u32 = 0x0015;
const BOOLEAN_STATE_CLUSTER_ID: u32 = 0x0045;

/// Registration metadata for the built-in factory table.
pub fn metadata() -> PluginMetadata {
    PluginMetadata::new(
        PLUGIN_NAME,
        env!("CARGO_PKG_VERSION"),
        "Bridges a single demo contact sensor",
        "Hearth Developers",
        PluginKind::AccessoryPlatform,
    )
}

#[derive(Debug, Default)]
pub struct DemoAccessoryPlatform {
    handle: StdMutex<Option<Arc<PlatformHandle>>>,
}

impl DemoAccessoryPlatform {
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

    /// Build the sensor from the plugin config, falling back to fixed demo
    /// values. The serial number feeds the unique id, so overriding it in
    /// the config produces a genuinely different device.
    fn sensor(&self, handle: &PlatformHandle) -> BridgedDevice {
        let name: String = handle
            .config_value("deviceName")
            .unwrap_or_else(|| "Demo Contact Sensor".to_string());
        let serial: String = handle
            .config_value("serialNumber")
            .unwrap_or_else(|| "DCS-0001".to_string());

        BridgedDevice::new(
            name,
            CONTACT_SENSOR_DEVICE_TYPE,
            BasicInformation {
                vendor_id: 0xfff1,
                vendor_name: "Hearth Demo".to_string(),
                product_id: 0x8001,
                product_name: "Demo Contact Sensor".to_string(),
                serial_number: serial.clone(),
                unique_id: format!("{PLUGIN_NAME}-{serial}"),
                software_version: 1,
                software_version_string: env!("CARGO_PKG_VERSION").to_string(),
                hardware_version: 1,
                hardware_version_string: "demo".to_string(),
            },
        )
        .with_clusters(vec![ClusterSnapshot {
            cluster_id: BOOLEAN_STATE_CLUSTER_ID,
            cluster_name: "BooleanState".to_string(),
            attributes: serde_json::json!({ "stateValue": true }),
        }])
    }
}

#[async_trait]
impl PlatformPlugin for DemoAccessoryPlatform {
    fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn kind(&self) -> PluginKind {
        PluginKind::AccessoryPlatform
    }

    async fn on_load(&self, handle: Arc<PlatformHandle>) -> PlatformResult<()> {
        log::info!(target: handle.log_target(), "Demo accessory platform loaded");
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

        let sensor = self.sensor(&handle);
        let name = sensor.name.clone();
        handle.register_device(sensor).await?;
        log::info!(target: handle.log_target(), "Registered '{}'", name);
        Ok(())
    }

    async fn on_configure(&self) -> PlatformResult<()> {
        if let Some(handle) = self.handle() {
            log::info!(target: handle.log_target(), "Demo accessory platform configured");
        }
        Ok(())
    }

    async fn on_shutdown(&self, reason: Option<&str>) -> PlatformResult<()> {
        if let Some(handle) = self.handle() {
            log::info!(
                target: handle.log_target(),
                "Demo accessory platform shutting down ({})",
                reason.unwrap_or("no reason given")
            );
        }
        Ok(())
    }
}
