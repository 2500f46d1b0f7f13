//! # amencast-worker
//!
//! Worker binary: loads settings, connects the bus and runs the selected
//! pipeline stages plus the health endpoint until SIGINT.

#![deny(unsafe_code)]

mod stage_factory;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info};

use amencast_core::logging::init_subscriber;
use amencast_server::{HealthServer, ShutdownCoordinator};
use amencast_settings::{
    AmencastSettings, BusKind, StageKind, load_settings_from_path, settings_path,
    validate_credentials,
};

/// Bus transport selectable on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BusArg {
    /// In-process bus; every stage must run in this process.
    Memory,
    /// Redis pub/sub.
    Redis,
}

impl From<BusArg> for BusKind {
    fn from(arg: BusArg) -> Self {
        match arg {
            BusArg::Memory => Self::Memory,
            BusArg::Redis => Self::Redis,
        }
    }
}

/// AmenCast pipeline worker.
#[derive(Parser, Debug)]
#[command(name = "amencast-worker", about = "AmenCast translation pipeline worker")]
struct Cli {
    /// Settings file (defaults to `~/.amencast/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stages to run, comma separated.
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "transcription,translation,synthesis"
    )]
    stages: Vec<StageKind>,

    /// Bus transport (overrides settings).
    #[arg(long, value_enum)]
    bus: Option<BusArg>,

    /// Health endpoint port (overrides settings).
    #[arg(long)]
    health_port: Option<u16>,
}

impl Cli {
    /// Stages in pipeline order, without duplicates.
    fn stage_kinds(&self) -> Vec<StageKind> {
        StageKind::ALL
            .into_iter()
            .filter(|k| self.stages.contains(k))
            .collect()
    }

    fn apply(&self, settings: &mut AmencastSettings) {
        if let Some(bus) = self.bus {
            settings.bus.kind = bus.into();
        }
        if let Some(port) = self.health_port {
            settings.server.health_port = port;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let path = args.config.clone().unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    args.apply(&mut settings);
    init_subscriber(&settings.logging.level, settings.logging.json);

    let kinds = args.stage_kinds();
    validate_credentials(&settings, &kinds).context("Worker is not configured")?;

    let bus = stage_factory::build_bus(&settings.bus).await?;
    let stages = stage_factory::build_stages(&settings, &kinds, &bus)?;
    let coordinator = Arc::new(ShutdownCoordinator::new());

    let mut handles = Vec::with_capacity(stages.len() + 1);
    for stage in &stages {
        let stage = Arc::clone(stage);
        let token = coordinator.token();
        let coordinator = Arc::clone(&coordinator);
        handles.push(tokio::spawn(async move {
            if let Err(e) = stage.run(token).await {
                error!(stage = stage.name(), error = %e, "stage failed, shutting down");
                coordinator.shutdown();
            }
        }));
    }

    let server = HealthServer::new(settings.server.clone(), stages, Arc::clone(&coordinator));
    let listener = server.bind().await.context("Failed to bind health server")?;
    let token = coordinator.token();
    handles.push(tokio::spawn(async move {
        if let Err(e) = server.serve(listener, token).await {
            error!(error = %e, "health server failed");
        }
    }));

    info!(
        stages = ?kinds,
        bus = ?settings.bus.kind,
        health_port = settings.server.health_port,
        "AmenCast worker running"
    );

    let stopped = coordinator.token();
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
            info!("Shutting down...");
        }
        () = stopped.cancelled() => info!("Shutting down after stage failure..."),
    }

    let timeout = Duration::from_millis(settings.server.shutdown_timeout_ms);
    if !coordinator.graceful_shutdown(handles, Some(timeout)).await {
        error!("some tasks did not stop in time");
    }
    info!("Shutdown complete");
    Ok(())
}
