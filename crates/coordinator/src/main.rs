// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Labgrid coordinator (labgrid-coordinator)
//!
//! Owns places, resources and reservations; clients and exporters connect
//! over TCP.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lg_coordinator::{lifecycle, Config, Telemetry};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "labgrid-coordinator", version, about = "Labgrid coordinator")]
struct Args {
    /// Address to listen on
    #[arg(long, short = 'l', env = "LG_LISTEN")]
    listen: Option<SocketAddr>,

    /// Directory for persistent places and logs
    #[arg(long, short = 'd', env = "LG_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(state_dir) = args.state_dir {
        config.state_dir = Some(state_dir);
    }

    let telemetry =
        Telemetry::init(config.state_dir.as_deref()).context("failed to set up logging")?;

    let coordinator = match lifecycle::startup(&config).await {
        Ok(c) => c,
        Err(e) => {
            error!("failed to start coordinator: {}", e);
            drop(telemetry);
            return Err(e.into());
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    // Signal readiness (and the bound port) to whoever started us
    println!("READY {}", coordinator.local_addr());

    coordinator
        .run_until(async {
            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM, shutting down..."),
                _ = sigint.recv() => info!("received SIGINT, shutting down..."),
            }
        })
        .await?;

    info!("coordinator stopped");
    Ok(())
}
