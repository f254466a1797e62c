//! # Hearth Core Plugin Loader
//!
//! Resolves plugin factories and produces live [`PlatformPlugin`] instances.
//!
//! Two sources exist: a built-in factory table seeded by the host binary,
//! and shared libraries loaded through `libloading`. A dynamic plugin crate
//! uses [`export_platform!`] to expose the two C symbols the loader expects:
//! `_hearth_platform_api_version` (gate, must return
//! [`PLATFORM_API_VERSION`]) and `_hearth_platform_create` (hands the host
//! ownership of a boxed platform instance). Loaded libraries are kept alive
//! for the rest of the process so instances never outlive their code.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use libloading::{Library, Symbol};

use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::traits::{PlatformFactory, PlatformPlugin};
use crate::plugin_system::types::PluginMetadata;

/// Platform ABI version the host was built against.
pub const PLATFORM_API_VERSION: u32 = 1;

/// Manifest file name looked up inside a plugin directory.
pub const MANIFEST_FILE: &str = "hearth.plugin.json";

const API_VERSION_SYMBOL: &[u8] = b"_hearth_platform_api_version\0";
const CREATE_SYMBOL: &[u8] = b"_hearth_platform_create\0";

/// Export the platform entry points from a dynamic plugin crate.
///
/// The type must implement `PlatformPlugin` and `Default`.
#[macro_export]
macro_rules! export_platform {
    ($platform_type:ty) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn _hearth_platform_api_version() -> u32 {
            $crate::plugin_system::loader::PLATFORM_API_VERSION
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn _hearth_platform_create()
        -> *mut dyn $crate::plugin_system::traits::PlatformPlugin {
            let platform: Box<dyn $crate::plugin_system::traits::PlatformPlugin> =
                Box::new(<$platform_type>::default());
            Box::into_raw(platform)
        }
    };
}

/// Factory resolver for platform plugins.
#[derive(Default)]
pub struct PluginLoader {
    builtins: StdMutex<HashMap<String, PlatformFactory>>,
    // Keeps dynamic libraries mapped while their instances are alive.
    libraries: StdMutex<Vec<Library>>,
}

impl PluginLoader {
    pub fn new() -> Self {
        PluginLoader {
            builtins: StdMutex::new(HashMap::new()),
            libraries: StdMutex::new(Vec::new()),
        }
    }

    /// Register a built-in factory under a plugin name. Built-ins take
    /// precedence over a shared library with the same name.
    pub fn register_builtin(&self, name: impl Into<String>, factory: PlatformFactory) {
        let name = name.into();
        log::debug!("Registering built-in platform factory '{}'", name);
        match self.builtins.lock() {
            Ok(mut guard) => {
                guard.insert(name, factory);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(name, factory);
            }
        }
    }

    pub fn has_builtin(&self, name: &str) -> bool {
        match self.builtins.lock() {
            Ok(guard) => guard.contains_key(name),
            Err(poisoned) => poisoned.into_inner().contains_key(name),
        }
    }

    fn builtin(&self, name: &str) -> Option<PlatformFactory> {
        match self.builtins.lock() {
            Ok(guard) => guard.get(name).cloned(),
            Err(poisoned) => poisoned.into_inner().get(name).cloned(),
        }
    }

    /// Read and parse a plugin manifest. `path` may point at the manifest
    /// file itself or at the plugin directory containing it. Returns the
    /// parsed metadata together with the plugin directory.
    pub fn read_manifest(path: &Path) -> Result<(PluginMetadata, PathBuf), PluginSystemError> {
        let (manifest_path, plugin_dir) = if path.is_dir() {
            (path.join(MANIFEST_FILE), path.to_path_buf())
        } else {
            let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
            (path.to_path_buf(), dir)
        };

        let raw = std::fs::read_to_string(&manifest_path).map_err(|e| {
            PluginSystemError::ManifestError {
                path: manifest_path.clone(),
                message: "cannot read manifest".to_string(),
                source: Some(Box::new(e)),
            }
        })?;
        let metadata: PluginMetadata =
            serde_json::from_str(&raw).map_err(|e| PluginSystemError::ManifestError {
                path: manifest_path.clone(),
                message: "manifest is not valid JSON".to_string(),
                source: Some(Box::new(e)),
            })?;

        if metadata.name.is_empty() {
            return Err(PluginSystemError::ManifestError {
                path: manifest_path,
                message: "manifest declares an empty plugin name".to_string(),
                source: None,
            });
        }

        Ok((metadata, plugin_dir))
    }

    /// Produce a live platform instance for `name`, from the built-in table
    /// or from the shared library under `dir`.
    pub fn instantiate(
        &self,
        name: &str,
        dir: Option<&Path>,
    ) -> Result<Arc<dyn PlatformPlugin>, PluginSystemError> {
        if let Some(factory) = self.builtin(name) {
            return Ok(factory());
        }
        match dir {
            Some(dir) => self.load_dynamic(name, dir),
            None => Err(PluginSystemError::LoadingError {
                plugin: name.to_string(),
                path: None,
                message: "no built-in factory registered and no library path recorded".to_string(),
            }),
        }
    }

    fn load_dynamic(
        &self,
        name: &str,
        dir: &Path,
    ) -> Result<Arc<dyn PlatformPlugin>, PluginSystemError> {
        let lib_path = find_library(dir, name)?;
        log::debug!(
            "Loading platform '{}' from library {}",
            name,
            lib_path.display()
        );

        // SAFETY: the operator registered this library path explicitly; the
        // exported symbols are expected to follow the platform ABI contract.
        let library = unsafe { Library::new(&lib_path) }.map_err(|e| {
            PluginSystemError::LoadingError {
                plugin: name.to_string(),
                path: Some(lib_path.clone()),
                message: e.to_string(),
            }
        })?;

        // SAFETY: resolving C symbols exported by the plugin.
        let api_version_fn: Symbol<extern "C" fn() -> u32> =
            unsafe { library.get(API_VERSION_SYMBOL) }.map_err(|e| {
                PluginSystemError::LoadingError {
                    plugin: name.to_string(),
                    path: Some(lib_path.clone()),
                    message: e.to_string(),
                }
            })?;
        let found = api_version_fn();
        if found != PLATFORM_API_VERSION {
            return Err(PluginSystemError::ApiVersionMismatch {
                plugin: name.to_string(),
                expected: PLATFORM_API_VERSION,
                found,
            });
        }

        // SAFETY: same contract as above.
        let create_fn: Symbol<extern "C" fn() -> *mut dyn PlatformPlugin> =
            unsafe { library.get(CREATE_SYMBOL) }.map_err(|e| PluginSystemError::LoadingError {
                plugin: name.to_string(),
                path: Some(lib_path.clone()),
                message: e.to_string(),
            })?;

        // SAFETY: the create symbol transfers ownership of a boxed instance.
        let instance = unsafe { Box::from_raw(create_fn()) };

        match self.libraries.lock() {
            Ok(mut guard) => guard.push(library),
            Err(poisoned) => poisoned.into_inner().push(library),
        }

        Ok(Arc::from(instance))
    }
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let builtins = match self.builtins.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        };
        f.debug_struct("PluginLoader")
            .field("builtins", &builtins)
            .finish()
    }
}

/// Locate the shared library for a plugin inside its directory. Tries the
/// plain name, the `lib` prefix and the dash-to-underscore spelling cargo
/// gives cdylib artifacts.
fn find_library(dir: &Path, name: &str) -> Result<PathBuf, PluginSystemError> {
    let extensions: &[&str] = if cfg!(target_os = "macos") {
        &["dylib", "so"]
    } else if cfg!(target_os = "windows") {
        &["dll"]
    } else {
        &["so"]
    };

    let underscored = name.replace('-', "_");
    for ext in extensions {
        for stem in [name, &underscored] {
            for candidate in [format!("{stem}.{ext}"), format!("lib{stem}.{ext}")] {
                let lib_path = dir.join(candidate);
                if lib_path.exists() {
                    return Ok(lib_path);
                }
            }
        }
    }

    Err(PluginSystemError::LoadingError {
        plugin: name.to_string(),
        path: Some(dir.to_path_buf()),
        message: "no shared library found in plugin directory".to_string(),
    })
}
