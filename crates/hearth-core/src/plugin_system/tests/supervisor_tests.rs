use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::plugin_system::manager::create_shared_registry;
use crate::plugin_system::registry::SharedPluginRegistry;
use crate::plugin_system::supervisor::{StartupOutcome, StartupSupervisor};
use crate::plugin_system::traits::PluginKind;
use crate::plugin_system::types::{PluginMetadata, PluginRecord};
use crate::shutdown::scheduler::Scheduler;

const POLL: Duration = Duration::from_millis(25);

fn record(name: &str) -> PluginRecord {
    PluginRecord::new(
        PluginMetadata::new(name, "1.0.0", "", "", PluginKind::DynamicPlatform),
        None,
    )
}

fn ready(name: &str) -> PluginRecord {
    let mut record = record(name);
    record.mark_loaded();
    record.mark_started();
    record
}

fn errored(name: &str) -> PluginRecord {
    let mut record = record(name);
    record.mark_error();
    record
}

fn disabled(name: &str) -> PluginRecord {
    let mut record = record(name);
    record.enabled = false;
    record
}

async fn registry_with(records: Vec<PluginRecord>) -> SharedPluginRegistry {
    let registry = create_shared_registry();
    {
        let mut guard = registry.lock().await;
        for record in records {
            guard.register(record).expect("register test record");
        }
    }
    registry
}

/// Scheduler that only counts. The sleeps themselves take no time.
#[derive(Debug, Default)]
struct CountingScheduler {
    sleeps: StdMutex<Vec<Duration>>,
}

impl CountingScheduler {
    fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("sleeps lock").clone()
    }
}

#[async_trait]
impl Scheduler for CountingScheduler {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().expect("sleeps lock").push(duration);
    }
}

#[derive(Debug, Clone, Copy)]
enum SleepAction {
    MarkReady(&'static str),
    MarkError(&'static str),
}

/// Scheduler that mutates a plugin record once the n-th sleep is reached,
/// standing in for a plugin whose start hook lands mid-wait.
#[derive(Debug)]
struct ScriptedScheduler {
    registry: SharedPluginRegistry,
    trigger_after: usize,
    action: SleepAction,
    sleeps: StdMutex<Vec<Duration>>,
}

impl ScriptedScheduler {
    fn new(registry: SharedPluginRegistry, trigger_after: usize, action: SleepAction) -> Self {
        ScriptedScheduler {
            registry,
            trigger_after,
            action,
            sleeps: StdMutex::new(Vec::new()),
        }
    }

    fn sleep_count(&self) -> usize {
        self.sleeps.lock().expect("sleeps lock").len()
    }
}

#[async_trait]
impl Scheduler for ScriptedScheduler {
    async fn sleep(&self, duration: Duration) {
        let count = {
            let mut sleeps = self.sleeps.lock().expect("sleeps lock");
            sleeps.push(duration);
            sleeps.len()
        };
        if count != self.trigger_after {
            return;
        }
        let mut registry = self.registry.lock().await;
        match self.action {
            SleepAction::MarkReady(name) => {
                if let Some(entry) = registry.get_mut(name) {
                    entry.record.mark_loaded();
                    entry.record.mark_started();
                }
            }
            SleepAction::MarkError(name) => {
                if let Some(entry) = registry.get_mut(name) {
                    entry.record.mark_error();
                }
            }
        }
    }
}

#[tokio::test]
async fn test_empty_registry_is_ready_immediately() {
    let registry = registry_with(Vec::new()).await;
    let scheduler = Arc::new(CountingScheduler::default());
    let supervisor = StartupSupervisor::new(registry, scheduler.clone()).with_policy(POLL, 5);

    let outcome = supervisor.wait_until_ready().await;

    assert_eq!(outcome, StartupOutcome::Ready { attempts: 1 });
    assert!(scheduler.sleeps().is_empty());
}

#[tokio::test]
async fn test_ready_plugins_and_disabled_laggards() {
    let registry = registry_with(vec![ready("alpha"), disabled("beta")]).await;
    let scheduler = Arc::new(CountingScheduler::default());
    let supervisor = StartupSupervisor::new(registry, scheduler.clone()).with_policy(POLL, 5);

    let outcome = supervisor.wait_until_ready().await;

    // A disabled plugin never counts as pending, however unready it is.
    assert_eq!(outcome, StartupOutcome::Ready { attempts: 1 });
    assert!(scheduler.sleeps().is_empty());
}

#[tokio::test]
async fn test_errored_plugin_aborts_without_waiting() {
    let registry = registry_with(vec![errored("alpha"), record("beta")]).await;
    let scheduler = Arc::new(CountingScheduler::default());
    let supervisor = StartupSupervisor::new(registry, scheduler.clone()).with_policy(POLL, 5);

    let outcome = supervisor.wait_until_ready().await;

    assert_eq!(
        outcome,
        StartupOutcome::Aborted {
            failed: vec!["alpha".to_string()]
        }
    );
    assert!(scheduler.sleeps().is_empty());
}

#[tokio::test]
async fn test_waits_for_plugin_to_catch_up() {
    let registry = registry_with(vec![record("alpha")]).await;
    let scheduler = Arc::new(ScriptedScheduler::new(
        registry.clone(),
        2,
        SleepAction::MarkReady("alpha"),
    ));
    let supervisor =
        StartupSupervisor::new(registry, scheduler.clone()).with_policy(POLL, 10);

    let outcome = supervisor.wait_until_ready().await;

    // Two unready polls, two sleeps, then the third poll sees it ready.
    assert_eq!(outcome, StartupOutcome::Ready { attempts: 3 });
    assert_eq!(scheduler.sleep_count(), 2);
}

#[tokio::test]
async fn test_exhaustion_latches_error_on_laggards() {
    let registry = registry_with(vec![ready("alpha"), record("slow")]).await;
    let scheduler = Arc::new(CountingScheduler::default());
    let supervisor =
        StartupSupervisor::new(registry.clone(), scheduler.clone()).with_policy(POLL, 3);

    let outcome = supervisor.wait_until_ready().await;

    assert_eq!(
        outcome,
        StartupOutcome::Aborted {
            failed: vec!["slow".to_string()]
        }
    );
    // Attempts 1 and 2 each sleep; attempt 3 exhausts instead.
    assert_eq!(scheduler.sleeps(), vec![POLL, POLL]);

    let guard = registry.lock().await;
    let slow = guard.get("slow").expect("slow is registered");
    assert!(slow.record.error);
    let alpha = guard.get("alpha").expect("alpha is registered");
    assert!(!alpha.record.error);
}

#[tokio::test]
async fn test_error_landing_mid_wait_aborts_next_poll() {
    let registry = registry_with(vec![record("alpha")]).await;
    let scheduler = Arc::new(ScriptedScheduler::new(
        registry.clone(),
        1,
        SleepAction::MarkError("alpha"),
    ));
    let supervisor =
        StartupSupervisor::new(registry, scheduler.clone()).with_policy(POLL, 10);

    let outcome = supervisor.wait_until_ready().await;

    assert_eq!(
        outcome,
        StartupOutcome::Aborted {
            failed: vec!["alpha".to_string()]
        }
    );
    assert_eq!(scheduler.sleep_count(), 1);
}

#[tokio::test]
async fn test_attempt_bound_is_clamped_to_one() {
    let registry = registry_with(vec![record("alpha")]).await;
    let scheduler = Arc::new(CountingScheduler::default());
    let supervisor =
        StartupSupervisor::new(registry.clone(), scheduler.clone()).with_policy(POLL, 0);

    let outcome = supervisor.wait_until_ready().await;

    // A zero bound still polls once before giving up.
    assert!(!outcome.is_ready());
    assert!(scheduler.sleeps().is_empty());
    let guard = registry.lock().await;
    assert!(guard.get("alpha").expect("alpha is registered").record.error);
}
