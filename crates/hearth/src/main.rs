mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use hearth_core::kernel::bootstrap::{default_base_path, Hearth, HearthConfig, RunOutcome};
use hearth_core::kernel::constants::{APP_NAME, APP_VERSION};
use hearth_core::plugin_system::traits::PlatformPlugin;
use hearth_core::shutdown::coordinator::{ResetAction, ShutdownKind};
use hearth_core::topology::manager::BridgeMode;
use hearth_core::AdminCommand;
use log::{error, info};

use demo_accessory::DemoAccessoryPlatform;
use demo_dynamic::DemoDynamicPlatform;

/// Hearth: a plugin-hosting commissioning bridge
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Storage root (defaults to ~/.hearth)
    #[arg(long, value_name = "DIR")]
    base_path: Option<PathBuf>,

    /// Bridge mode for this run: bridge, childbridge or controller
    #[arg(long, value_name = "MODE")]
    mode: Option<String>,

    /// Startup reason forwarded to plugin start hooks
    #[arg(long, value_name = "TEXT")]
    reason: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered plugins
    List,
    /// Print the persisted storage contents
    #[command(name = "logstorage")]
    LogStorage,
    /// Register a plugin from its directory or manifest file
    Add {
        /// Path to the plugin directory or its manifest
        path: PathBuf,
    },
    /// Remove a registered plugin
    Remove {
        /// The name of the plugin to remove
        name: String,
    },
    /// Enable a plugin (takes effect on the next run)
    Enable {
        /// The name of the plugin to enable
        name: String,
    },
    /// Disable a plugin
    Disable {
        /// The name of the plugin to disable
        name: String,
    },
    /// Wipe the commissioning identity store, forcing re-pairing
    Reset,
    /// Wipe the whole persisted store
    #[command(name = "factoryreset")]
    FactoryReset,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let args = CliArgs::parse();

    println!("{} v{}: plugin-hosting commissioning bridge", APP_NAME, APP_VERSION);

    let base_path = args.base_path.clone().unwrap_or_else(default_base_path);
    let mut config = match HearthConfig::load(base_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load bridge configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(mode) = args.mode.as_deref() {
        match mode.parse::<BridgeMode>() {
            Ok(mode) => config.mode = mode,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(2);
            }
        }
    }
    if args.reason.is_some() {
        config.startup_reason = args.reason.clone();
    }

    // One-shot subcommands apply their verb and exit; only the default
    // invocation runs the bridge.
    if let Some(command) = args.command {
        run_one_shot(command, config).await;
        return;
    }

    info!("Starting bridge ({} mode)", config.mode);
    loop {
        let mut hearth = Hearth::new(config.clone());
        if let Err(e) = register_demo_platforms(&hearth).await {
            eprintln!("Failed to register demo platforms: {}", e);
            std::process::exit(1);
        }

        // A ctrl-c anywhere in the run turns into an ordinary coordinated
        // shutdown; the coordinator aborts this task when something else
        // ends the run first.
        let coordinator = hearth.coordinator();
        let signal_task = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("SIGINT received");
                    coordinator
                        .run(ShutdownKind::Shutdown, "SIGINT received", ResetAction::None)
                        .await;
                }
            }
        });
        coordinator.register_task(signal_task.abort_handle());

        match hearth.run().await {
            Ok(RunOutcome::Shutdown) => break,
            Ok(RunOutcome::Restart) => {
                info!("Restart requested, constructing a fresh context");
                config.startup_reason = Some("restart".to_string());
            }
            Ok(RunOutcome::Update) => {
                info!("Update requested, invoking the package manager");
                if let Err(e) = hearth.packages().install(APP_NAME, None).await {
                    error!("Bridge update failed: {}", e);
                }
                config.startup_reason = Some("update".to_string());
            }
            Err(e) => {
                eprintln!("Bridge run failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    println!("Bridge stopped.");
}

async fn run_one_shot(command: Commands, config: HearthConfig) {
    let result = match command {
        Commands::List => cli::run_list(config).await,
        Commands::LogStorage => cli::run_log_storage(config).await,
        Commands::Add { path } => {
            cli::run_admin_command(config, AdminCommand::AddPlugin { path }).await
        }
        Commands::Remove { name } => {
            cli::run_admin_command(config, AdminCommand::RemovePlugin { name }).await
        }
        Commands::Enable { name } => {
            cli::run_admin_command(config, AdminCommand::EnablePlugin { name }).await
        }
        Commands::Disable { name } => {
            cli::run_admin_command(config, AdminCommand::DisablePlugin { name }).await
        }
        Commands::Reset => cli::run_admin_command(config, AdminCommand::Reset).await,
        Commands::FactoryReset => {
            cli::run_admin_command(config, AdminCommand::FactoryReset).await
        }
    };
    if let Err(e) = result {
        eprintln!("Command failed: {}", e);
        std::process::exit(1);
    }
}

/// Seed the built-in factory table with the demo platforms, the same way a
/// downstream host registers its own in-tree platforms. Persisted records
/// keep their toggles, so a disabled demo stays disabled across runs.
async fn register_demo_platforms(hearth: &Hearth) -> hearth_core::Result<()> {
    let orchestrator = hearth.orchestrator();

    orchestrator
        .register_builtin(
            demo_accessory::metadata(),
            Arc::new(|| {
                let platform: Arc<dyn PlatformPlugin> = Arc::new(DemoAccessoryPlatform::default());
                platform
            }),
        )
        .await?;
    println!("  - Registered: {}", demo_accessory::PLUGIN_NAME);

    orchestrator
        .register_builtin(
            demo_dynamic::metadata(),
            Arc::new(|| {
                let platform: Arc<dyn PlatformPlugin> = Arc::new(DemoDynamicPlatform::default());
                platform
            }),
        )
        .await?;
    println!("  - Registered: {}", demo_dynamic::PLUGIN_NAME);

    Ok(())
}
