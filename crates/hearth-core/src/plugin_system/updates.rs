//! Package manager boundary and the periodic version-check poller.
//!
//! Installing and updating packages is host-environment work the bridge
//! only delegates. The [`PackageManager`] trait is that seam; the default
//! [`NoopPackageManager`] knows no registry and refuses installs, which
//! keeps the admin verbs honest on systems without one.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use semver::Version;

use crate::kernel::constants::{APP_NAME, APP_VERSION, VERSION_POLL_INTERVAL_MS};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::registry::SharedPluginRegistry;
use crate::shutdown::scheduler::Scheduler;

/// Boundary to whatever installs plugin packages on this host.
#[async_trait]
pub trait PackageManager: Send + Sync + Debug {
    /// Install or update a named package, optionally pinned to a version.
    async fn install(&self, name: &str, version: Option<&str>) -> Result<(), PluginSystemError>;

    /// Newest published version of a package, `None` when unknown.
    async fn latest_version(&self, name: &str) -> Result<Option<String>, PluginSystemError>;
}

/// Package manager for hosts without one. Installs fail, lookups see
/// nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPackageManager;

#[async_trait]
impl PackageManager for NoopPackageManager {
    async fn install(&self, name: &str, _version: Option<&str>) -> Result<(), PluginSystemError> {
        Err(PluginSystemError::InternalError(format!(
            "no package manager configured, cannot install '{name}'"
        )))
    }

    async fn latest_version(&self, _name: &str) -> Result<Option<String>, PluginSystemError> {
        Ok(None)
    }
}

/// Periodically compares installed versions against the package manager's
/// newest published ones. Log-only; records the newest seen version on each
/// plugin record so admin listings can surface it.
#[derive(Debug)]
pub struct UpdateChecker {
    registry: SharedPluginRegistry,
    packages: Arc<dyn PackageManager>,
    scheduler: Arc<dyn Scheduler>,
    interval: Duration,
}

impl UpdateChecker {
    pub fn new(
        registry: SharedPluginRegistry,
        packages: Arc<dyn PackageManager>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        UpdateChecker {
            registry,
            packages,
            scheduler,
            interval: Duration::from_millis(VERSION_POLL_INTERVAL_MS),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Poll forever. Runs as a spawned task; coordinated shutdown cancels it
    /// by aborting the task.
    pub async fn run(&self) {
        loop {
            let found = self.check_once().await;
            if found > 0 {
                log::info!("{} update(s) available", found);
            }
            self.scheduler.sleep(self.interval).await;
        }
    }

    /// One sweep over the bridge itself and every registered plugin.
    /// Returns how many updates were found.
    pub async fn check_once(&self) -> usize {
        let mut found = 0;

        match self.packages.latest_version(APP_NAME).await {
            Ok(Some(latest)) if is_newer(APP_VERSION, &latest) => {
                log::info!("Update available for {}: {} -> {}", APP_NAME, APP_VERSION, latest);
                found += 1;
            }
            Ok(_) => {}
            Err(e) => log::debug!("Version check for {} failed: {}", APP_NAME, e),
        }

        let installed: Vec<(String, String)> = {
            let registry = self.registry.lock().await;
            registry
                .entries()
                .iter()
                .map(|entry| (entry.record.name.clone(), entry.record.version.clone()))
                .collect()
        };

        for (name, version) in installed {
            let latest = match self.packages.latest_version(&name).await {
                Ok(Some(latest)) => latest,
                Ok(None) => continue,
                Err(e) => {
                    log::debug!("Version check for plugin '{}' failed: {}", name, e);
                    continue;
                }
            };
            if is_newer(&version, &latest) {
                log::info!("Update available for plugin '{}': {} -> {}", name, version, latest);
                found += 1;
            }
            let mut registry = self.registry.lock().await;
            if let Some(entry) = registry.get_mut(&name) {
                entry.record.latest_version = Some(latest);
            }
        }

        found
    }
}

/// Semver compare; unparseable versions never count as updates.
fn is_newer(current: &str, candidate: &str) -> bool {
    match (Version::parse(current), Version::parse(candidate)) {
        (Ok(current), Ok(candidate)) => candidate > current,
        _ => {
            log::debug!(
                "Cannot compare versions '{}' and '{}'",
                current,
                candidate
            );
            false
        }
    }
}
