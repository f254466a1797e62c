//! Bounded-retry startup supervisor.
//!
//! After the orchestrator has issued load+start for every enabled plugin,
//! the supervisor polls the registry until each of them reports
//! loaded+started, or until the attempt bound runs out. An errored plugin
//! aborts the wait immediately: the protocol servers must not come up while
//! any enabled plugin is failed. A plugin that never becomes ready within
//! the bound is latched into the error flag itself, so exhaustion degrades
//! into the same per-plugin error path rather than killing the process.
//!
//! The supervisor runs as a spawned task; coordinated shutdown cancels it by
//! aborting that task between polls, which leaves all plugin flags as they
//! were.

use std::sync::Arc;
use std::time::Duration;

use crate::kernel::constants::{STARTUP_MAX_ATTEMPTS, STARTUP_POLL_INTERVAL_MS};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::registry::SharedPluginRegistry;
use crate::shutdown::scheduler::Scheduler;

/// What the supervisor observed by the time it stopped polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    /// Every enabled plugin is loaded and started.
    Ready { attempts: u32 },
    /// At least one enabled plugin is in error; the protocol side must stay
    /// down. `failed` lists the plugins that caused the abort.
    Aborted { failed: Vec<String> },
}

impl StartupOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, StartupOutcome::Ready { .. })
    }
}

/// Polls plugin readiness with a fixed interval and a bounded attempt count.
#[derive(Debug)]
pub struct StartupSupervisor {
    registry: SharedPluginRegistry,
    scheduler: Arc<dyn Scheduler>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl StartupSupervisor {
    pub fn new(registry: SharedPluginRegistry, scheduler: Arc<dyn Scheduler>) -> Self {
        StartupSupervisor {
            registry,
            scheduler,
            poll_interval: Duration::from_millis(STARTUP_POLL_INTERVAL_MS),
            max_attempts: STARTUP_MAX_ATTEMPTS,
        }
    }

    /// Override the default poll policy.
    pub fn with_policy(mut self, poll_interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = poll_interval;
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Block until every enabled plugin is ready or the bound runs out.
    ///
    /// On exhaustion the still-pending plugins are marked errored; the flag
    /// state is re-read after the final sleep so a plugin that was removed
    /// or errored concurrently is not marked twice.
    pub async fn wait_until_ready(&self) -> StartupOutcome {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            let status = {
                let registry = self.registry.lock().await;
                let mut errored = Vec::new();
                let mut pending = Vec::new();
                for entry in registry.entries() {
                    if !entry.record.enabled {
                        continue;
                    }
                    if entry.record.error {
                        errored.push(entry.record.name.clone());
                    } else if !entry.record.is_ready() {
                        pending.push(entry.record.name.clone());
                    }
                }
                (errored, pending)
            };

            let (errored, pending) = status;
            if !errored.is_empty() {
                log::error!(
                    "Aborting startup: plugin(s) in error state: {}",
                    errored.join(", ")
                );
                return StartupOutcome::Aborted { failed: errored };
            }
            if pending.is_empty() {
                log::info!("All enabled plugins ready after {} attempt(s)", attempts);
                return StartupOutcome::Ready { attempts };
            }
            if attempts >= self.max_attempts {
                return self.exhaust(pending).await;
            }

            log::debug!(
                "Waiting for {} plugin(s) to become ready (attempt {}/{}): {}",
                pending.len(),
                attempts,
                self.max_attempts,
                pending.join(", ")
            );
            self.scheduler.sleep(self.poll_interval).await;
        }
    }

    /// Convert the laggards into per-plugin errors and abort.
    async fn exhaust(&self, pending: Vec<String>) -> StartupOutcome {
        let mut failed = Vec::new();
        let mut registry = self.registry.lock().await;
        for name in pending {
            // Re-validate under the lock: the plugin may have become ready,
            // errored or been removed while we were last asleep.
            let Some(entry) = registry.get_mut(&name) else {
                continue;
            };
            if !entry.record.enabled || entry.record.is_ready() {
                continue;
            }
            if !entry.record.error {
                let error = PluginSystemError::RetryExhausted {
                    plugin: name.clone(),
                    attempts: self.max_attempts,
                };
                log::error!("{}", error);
                entry.record.mark_error();
            }
            failed.push(name);
        }
        drop(registry);

        if failed.is_empty() {
            // Everyone caught up during the final sleep.
            log::info!(
                "All enabled plugins ready after {} attempt(s)",
                self.max_attempts
            );
            return StartupOutcome::Ready {
                attempts: self.max_attempts,
            };
        }
        StartupOutcome::Aborted { failed }
    }
}
