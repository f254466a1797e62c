use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::kernel::error::Result;
use crate::storage::error::StorageSystemError;
use crate::storage::provider::StorageProvider;

/// A namespaced key-value view over the persisted store.
///
/// Each context maps to one JSON document on disk (`context/<namespace>.json`)
/// holding an object of string keys. Every mutation writes the whole document
/// back through the provider, so the on-disk state always reflects the last
/// completed operation. The commissioning identity store and the plugin
/// registry snapshot both live in contexts.
pub struct StorageContext {
    namespace: String,
    path: PathBuf,
    provider: Arc<dyn StorageProvider>,
    values: Mutex<BTreeMap<String, Value>>,
}

impl std::fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.values.lock().map(|v| v.len()).unwrap_or(0);
        f.debug_struct("StorageContext")
            .field("namespace", &self.namespace)
            .field("keys", &len)
            .finish()
    }
}

impl StorageContext {
    /// Open (or create) the context for `namespace`, loading any persisted
    /// document from disk.
    pub fn open(
        provider: Arc<dyn StorageProvider>,
        context_dir: &std::path::Path,
        namespace: &str,
    ) -> Result<Self> {
        let path = context_dir.join(format!("{namespace}.json"));
        let values = if provider.is_file(&path) {
            let raw = provider.read_to_string(&path)?;
            serde_json::from_str::<BTreeMap<String, Value>>(&raw).map_err(|e| {
                StorageSystemError::DeserializationError {
                    format: "json".to_string(),
                    source: Box::new(e),
                }
            })?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            namespace: namespace.to_string(),
            path,
            provider,
            values: Mutex::new(values),
        })
    }

    /// The namespace this context persists under
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Read a typed value for `key`, if present.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let values = self.lock()?;
        match values.get(key) {
            None => Ok(None),
            Some(value) => {
                let typed = serde_json::from_value(value.clone()).map_err(|e| {
                    StorageSystemError::DeserializationError {
                        format: "json".to_string(),
                        source: Box::new(e),
                    }
                })?;
                Ok(Some(typed))
            }
        }
    }

    /// Read a typed value for `key`; when absent, materialize `fallback()`,
    /// persist it, and return it. Later calls always see the stored value.
    pub fn get_or_init<T, F>(&self, key: &str, fallback: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.get::<T>(key)? {
            return Ok(existing);
        }
        let value = fallback();
        self.set(key, &value)?;
        Ok(value)
    }

    /// Store a typed value under `key` and write the namespace through.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_value(value).map_err(|e| {
            StorageSystemError::SerializationError {
                format: "json".to_string(),
                source: Box::new(e),
            }
        })?;
        {
            let mut values = self.lock()?;
            values.insert(key.to_string(), json);
        }
        self.flush()
    }

    /// Remove `key`, returning whether it was present.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let removed = {
            let mut values = self.lock()?;
            values.remove(key).is_some()
        };
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }

    /// All keys currently present, in sorted order.
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    /// Drop every key and delete the backing document.
    pub fn clear(&self) -> Result<()> {
        {
            let mut values = self.lock()?;
            values.clear();
        }
        if self.provider.is_file(&self.path) {
            self.provider.remove_file(&self.path)?;
        }
        Ok(())
    }

    /// Write the current document back through the provider.
    pub fn flush(&self) -> Result<()> {
        let raw = {
            let values = self.lock()?;
            serde_json::to_string_pretty(&*values).map_err(|e| {
                StorageSystemError::SerializationError {
                    format: "json".to_string(),
                    source: Box::new(e),
                }
            })?
        };
        self.provider.write_string(&self.path, &raw)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Value>>> {
        self.values.lock().map_err(|_| {
            StorageSystemError::ContextUnavailable {
                namespace: self.namespace.clone(),
                message: "context lock poisoned".to_string(),
            }
            .into()
        })
    }
}
