//! Deployment unit launcher.
//!
//! # Architecture Overview
//!
//! ```text
//!   <home>/
//!   ├── lib/shared/<domain>/      shared libraries, one dir per domain
//!   └── apps/
//!       ├── <unit>/
//!       │   ├── deployment.toml   descriptor (resources, builder, domain, ...)
//!       │   ├── unit-config.toml  default config resource (watched)
//!       │   └── lib/              unit-local libraries
//!       └── <unit>-anchor.txt     written on start; delete to undeploy
//!
//!   ┌──────────────┐  deploy   ┌────────────────┐   owns   ┌─────────────────────┐
//!   │UnitSupervisor│──────────▶│ DeploymentUnit │─────────▶│ LifecycleController │
//!   └──────┬───────┘           └───────▲────────┘          └──────────┬──────────┘
//!          │ undeploy                  │ on_change                    │ creates
//!   ┌──────┴───────┐           ┌───────┴────────┐          ┌──────────▼──────────┐
//!   │AnchorWatcher │           │HotReloadWatcher│◀─────────│ RuntimeContext      │
//!   └──────────────┘           └────────────────┘ STARTED  │ + NotificationHub   │
//!                                                 STOPPING │ + ShutdownCoordinator│
//!                                                          └─────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use unit_launcher::config::{load_config, LauncherConfig};
use unit_launcher::lifecycle::signals::shutdown_signal;
use unit_launcher::lifecycle::DeploymentEnv;
use unit_launcher::observability::{logging, metrics};
use unit_launcher::supervisor::{AnchorWatcher, UnitSupervisor};

#[derive(Parser, Debug)]
#[command(name = "unit-launcher", version, about = "Deploy and supervise application units")]
struct Cli {
    /// Launcher home directory; overrides `home_dir` from the config file
    #[arg(long)]
    home: Option<PathBuf>,

    /// Path to the launcher config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Units to deploy in addition to those in the config file
    units: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => LauncherConfig::default(),
    };
    if let Some(home) = cli.home {
        config.home_dir = home;
    }
    for unit in cli.units {
        if !config.units.contains(&unit) {
            config.units.push(unit);
        }
    }
    if let Err(errors) = unit_launcher::config::validation::validate_config(&config) {
        for error in &errors {
            eprintln!("invalid configuration: {}", error);
        }
        return Err("invalid configuration".into());
    }

    logging::init(&config.observability);
    tracing::info!("unit-launcher v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        home = %config.home_dir.display(),
        units = config.units.len(),
        reload_interval_ms = config.reload.interval_ms,
        shutdown_timeout_ms = config.shutdown.timeout_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let supervisor = UnitSupervisor::new(DeploymentEnv::from_config(&config));
    for unit in &config.units {
        if let Err(e) = supervisor.deploy(unit).await {
            tracing::error!(unit = %unit, error = %e, "Unit not deployed");
        }
    }

    let (anchors, mut removed) = AnchorWatcher::new(&config.apps_dir());
    let _anchor_watcher = match anchors.run() {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(error = %e, "Marker watcher unavailable, undeploy by marker disabled");
            None
        }
    };

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(unit) = removed.recv() => {
                match supervisor.undeploy(&unit).await {
                    Ok(true) => {}
                    Ok(false) => tracing::debug!(unit = %unit, "Marker removed for unknown unit"),
                    Err(e) => tracing::error!(unit = %unit, error = %e, "Unit did not stop cleanly"),
                }
            }
        }
    }

    tracing::info!(units = supervisor.len(), "Shutting down");
    supervisor.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
