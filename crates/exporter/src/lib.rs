// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lg-exporter: publishes a host's lab resources to the coordinator

pub mod config;
pub mod probe;
pub mod session;

pub use config::{ConfigError, ExporterConfig, ResourceDecl};
pub use probe::{DeviceProbe, Probe};
pub use session::{Exporter, ExporterError};
