// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide logging setup

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Owns the log writer; dropping it flushes pending lines
///
/// Created once in `main` and kept alive for the life of the process.
pub struct Telemetry {
    _guard: Option<WorkerGuard>,
}

impl Telemetry {
    pub const LOG_FILE: &'static str = "coordinator.log";

    /// Log to `<state_dir>/coordinator.log` when a state directory is set,
    /// stderr otherwise. `RUST_LOG` overrides the default `info` filter.
    pub fn init(state_dir: Option<&Path>) -> std::io::Result<Self> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let Some(dir) = state_dir else {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
            return Ok(Self { _guard: None });
        };

        std::fs::create_dir_all(dir)?;
        let file_appender = tracing_appender::rolling::never(dir, Self::LOG_FILE);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .init();
        Ok(Self {
            _guard: Some(guard),
        })
    }
}
