use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;

use crate::commissioning::error::CommissioningError;
use crate::commissioning::identity::{CommissioningIdentity, DeclaredIdentity};
use crate::device::types::BasicInformation;
use crate::kernel::component::KernelComponent;
use crate::kernel::constants::IDENTITY_NAMESPACE;
use crate::kernel::error::{Error, Result};
use crate::storage::context::StorageContext;
use crate::storage::manager::DefaultStorageManager;

/// Owns the persistent commissioning identities.
///
/// `create` builds a synthetic identity from declared attributes (bridge
/// root, per-plugin child bridges); `import` derives one from a device's
/// own identity block (accessory topology). Either way the serial number
/// and unique id are read back from the store when present and only
/// generated on first use, so a restart never changes what commissioned
/// controllers see. Any store failure on this path is fatal.
#[derive(Clone)]
pub struct CommissioningManager {
    name: &'static str,
    storage: Arc<DefaultStorageManager>,
}

impl Debug for CommissioningManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommissioningManager")
            .field("name", &self.name)
            .finish()
    }
}

fn random_hex(len: usize) -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();
    (0..len).map(|_| HEX[rng.gen_range(0..16)] as char).collect()
}

impl CommissioningManager {
    pub fn new(storage: Arc<DefaultStorageManager>) -> Self {
        Self {
            name: "CommissioningManager",
            storage,
        }
    }

    fn identity_context(&self) -> Result<Arc<StorageContext>> {
        self.storage
            .context(IDENTITY_NAMESPACE)
            .map_err(|e| CommissioningError::persistence("cannot open identity store", e).into())
    }

    fn fatal<'a>(operation: &'a str, key: &'a str) -> impl FnOnce(Error) -> Error + 'a {
        move |e| {
            CommissioningError::persistence(format!("{operation} failed for identity '{key}'"), e)
                .into()
        }
    }

    /// Create (or refresh) the synthetic identity stored under `key`.
    pub fn create(&self, key: &str, declared: &DeclaredIdentity) -> Result<CommissioningIdentity> {
        let context = self.identity_context()?;
        let existing: Option<CommissioningIdentity> =
            context.get(key).map_err(Self::fatal("read", key))?;

        let serial_number = match &existing {
            Some(identity) => identity.serial_number.clone(),
            None => format!("0x{}", random_hex(16)),
        };
        let unique_id = match &existing {
            Some(identity) => identity.unique_id.clone(),
            None => random_hex(32),
        };

        let identity = CommissioningIdentity {
            device_name: declared.device_name.clone(),
            device_type: declared.device_type,
            vendor_id: declared.vendor_id,
            vendor_name: declared.vendor_name.clone(),
            product_id: declared.product_id,
            product_name: declared.product_name.clone(),
            serial_number,
            unique_id,
            software_version: declared.software_version,
            software_version_string: declared.software_version_string.clone(),
            hardware_version: declared.hardware_version,
            hardware_version_string: declared.hardware_version_string.clone(),
        };

        context.set(key, &identity).map_err(Self::fatal("write", key))?;
        log::debug!(
            "Commissioning identity '{}' ready (serial {})",
            key,
            identity.serial_number
        );
        Ok(identity)
    }

    /// Derive (or refresh) an identity under `key` from a device's own
    /// identity block. The stored serial/unique id win over the device's
    /// on every call after the first.
    pub fn import(
        &self,
        key: &str,
        device_name: &str,
        device_type: u32,
        basic: &BasicInformation,
    ) -> Result<CommissioningIdentity> {
        let context = self.identity_context()?;
        let existing: Option<CommissioningIdentity> =
            context.get(key).map_err(Self::fatal("read", key))?;

        let serial_number = match &existing {
            Some(identity) => identity.serial_number.clone(),
            None => basic.serial_number.clone(),
        };
        let unique_id = match &existing {
            Some(identity) => identity.unique_id.clone(),
            None => basic.unique_id.clone(),
        };

        let identity = CommissioningIdentity {
            device_name: device_name.to_string(),
            device_type,
            vendor_id: basic.vendor_id,
            vendor_name: basic.vendor_name.clone(),
            product_id: basic.product_id,
            product_name: basic.product_name.clone(),
            serial_number,
            unique_id,
            software_version: basic.software_version,
            software_version_string: basic.software_version_string.clone(),
            hardware_version: basic.hardware_version,
            hardware_version_string: basic.hardware_version_string.clone(),
        };

        context.set(key, &identity).map_err(Self::fatal("write", key))?;
        log::debug!(
            "Commissioning identity '{}' imported (serial {})",
            key,
            identity.serial_number
        );
        Ok(identity)
    }

    /// Read the identity stored under `key`, if any.
    pub fn get(&self, key: &str) -> Result<Option<CommissioningIdentity>> {
        let context = self.identity_context()?;
        context.get(key).map_err(Self::fatal("read", key))
    }

    /// Forget the identity under `key`. The next `create`/`import` for the
    /// key generates fresh serials, so commissioned controllers will treat
    /// it as a new device.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let context = self.identity_context()?;
        let removed = context.remove(key).map_err(Self::fatal("remove", key))?;
        if removed {
            log::info!("Commissioning identity '{}' removed", key);
        }
        Ok(removed)
    }

    /// Keys of every stored identity.
    pub fn keys(&self) -> Result<Vec<String>> {
        let context = self.identity_context()?;
        context
            .keys()
            .map_err(|e| CommissioningError::persistence("cannot list identities", e).into())
    }
}

#[async_trait]
impl KernelComponent for CommissioningManager {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn initialize(&self) -> Result<()> {
        // Probe the store now so a broken identity path fails boot instead
        // of first pairing
        self.identity_context()?;
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}
