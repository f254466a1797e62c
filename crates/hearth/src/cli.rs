//! One-shot admin subcommands.
//!
//! Each entry point builds a fresh context against the configured storage
//! root, replays the persisted plugin registry, applies its verb through the
//! admin surface, and finishes with a coordinated shutdown so the persisted
//! store ends up exactly as a served run would leave it.

use hearth_core::kernel::bootstrap::{Hearth, HearthConfig};
use hearth_core::kernel::component::KernelComponent;
use hearth_core::kernel::constants::{DEVICE_NAMESPACE, IDENTITY_NAMESPACE, REGISTRY_NAMESPACE};
use hearth_core::shutdown::coordinator::{ResetAction, ShutdownKind};
use hearth_core::storage::config::ConfigScope;
use hearth_core::{AdminCommand, AdminQuery, AdminResponse, Result};

/// Apply one mutating admin verb and exit.
pub async fn run_admin_command(config: HearthConfig, command: AdminCommand) -> Result<()> {
    let hearth = Hearth::new(config);
    prepare(&hearth).await?;

    let verb = command.verb();
    println!("Applying '{}'...", verb);
    let handler = hearth.admin_handler();
    handler.execute(command).await?;
    println!("Command '{}' applied.", verb);

    finish(&hearth, verb).await;
    Ok(())
}

/// Print every registered plugin with its toggle state.
pub async fn run_list(config: HearthConfig) -> Result<()> {
    let hearth = Hearth::new(config);
    prepare(&hearth).await?;

    let handler = hearth.admin_handler();
    if let AdminResponse::Plugins(records) = handler.query(AdminQuery::Plugins).await? {
        if records.is_empty() {
            println!("No plugins registered.");
        } else {
            println!("Registered plugins:");
            for record in &records {
                let status = if record.enabled { "Enabled" } else { "Disabled" };
                println!(
                    "  - Name: {}, Version: {}, Kind: {}, Status: {}",
                    record.name, record.version, record.kind, status
                );
            }
        }
    }

    finish(&hearth, "list").await;
    Ok(())
}

/// Print the persisted storage contents: context documents and config files.
pub async fn run_log_storage(config: HearthConfig) -> Result<()> {
    let hearth = Hearth::new(config);
    prepare(&hearth).await?;

    let storage = hearth.storage();
    println!("Storage root: {}", storage.base_path().display());
    for namespace in [IDENTITY_NAMESPACE, REGISTRY_NAMESPACE, DEVICE_NAMESPACE] {
        let context = storage.context(namespace)?;
        let keys = context.keys()?;
        println!("Context '{}': {} key(s)", namespace, keys.len());
        for key in keys {
            println!("  - {}", key);
        }
    }
    for (scope, label) in [
        (ConfigScope::Application, "application"),
        (ConfigScope::Plugin, "plugin"),
    ] {
        let mut names = storage.list_configs(scope)?;
        names.sort();
        println!("{} {} config(s)", names.len(), label);
        for name in names {
            println!("  - {}", name);
        }
    }

    finish(&hearth, "logstorage").await;
    Ok(())
}

/// Restore the persisted registry so the verb sees the same records a
/// served run sees.
async fn prepare(hearth: &Hearth) -> Result<()> {
    hearth.storage().ensure_directories()?;
    hearth.orchestrator().initialize().await?;
    Ok(())
}

/// Every one-shot ends with a coordinated shutdown. Destructive verbs have
/// already run it inside the handler, in which case the latch is set and
/// this is a no-op.
async fn finish(hearth: &Hearth, verb: &str) {
    let coordinator = hearth.coordinator();
    if !coordinator.in_progress() {
        coordinator
            .run(
                ShutdownKind::Shutdown,
                &format!("{verb} complete"),
                ResetAction::None,
            )
            .await;
    }
}
