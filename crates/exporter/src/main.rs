// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Labgrid exporter (labgrid-exporter)
//!
//! Publishes the resources declared in its config file and keeps their
//! availability current.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use lg_exporter::{DeviceProbe, Exporter, ExporterConfig};
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "labgrid-exporter", version, about = "Labgrid resource exporter")]
struct Args {
    /// Exporter configuration (TOML)
    config: PathBuf,

    /// Override the coordinator address from the config
    #[arg(long, short = 'x')]
    coordinator: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = ExporterConfig::load(&args.config)?;
    if let Some(coordinator) = args.coordinator {
        config.coordinator = coordinator;
    }
    let exporter = Exporter::new(config, DeviceProbe)?;
    info!(exporter = exporter.name(), "starting exporter");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    exporter
        .run_until(async {
            tokio::select! {
                _ = sigterm.recv() => {}
                _ = sigint.recv() => {}
            }
        })
        .await;
    Ok(())
}
