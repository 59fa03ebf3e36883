// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test utilities for CLI integration tests.

#![allow(dead_code)]

use assert_cmd::Command;
use lg_coordinator::{lifecycle, Config, Coordinator};
use tokio::runtime::Runtime;

/// A coordinator served from a background runtime for the length of a test
pub struct TestCoordinator {
    addr: String,
    coordinator: Option<Coordinator>,
    runtime: Runtime,
}

impl TestCoordinator {
    pub fn start() -> Self {
        let runtime = Runtime::new().expect("Failed to create runtime");
        let config = Config {
            listen: "127.0.0.1:0".parse().expect("valid address"),
            ..Config::default()
        };
        let coordinator = runtime
            .block_on(lifecycle::startup(&config))
            .expect("Failed to start coordinator");
        Self {
            addr: coordinator.local_addr().to_string(),
            coordinator: Some(coordinator),
            runtime,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// `labgrid-client` talking to this coordinator as `test/<user>`
    pub fn client(&self, user: &str) -> Command {
        client(&self.addr, user)
    }
}

impl Drop for TestCoordinator {
    fn drop(&mut self) {
        if let Some(coordinator) = self.coordinator.take() {
            let _ = self.runtime.block_on(coordinator.shutdown());
        }
    }
}

/// An address nothing listens on
pub fn closed_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    addr.to_string()
}

/// `labgrid-client` with a clean environment, pointed at `addr`
pub fn client(addr: &str, user: &str) -> Command {
    let mut cmd = Command::cargo_bin("labgrid-client").expect("binary built");
    cmd.env("LG_COORDINATOR", addr)
        .env("LG_HOSTNAME", "test")
        .env("LG_USERNAME", user)
        .env("LG_TIMEOUT_MS", "5000")
        .env_remove("LG_PLACE")
        .env_remove("LG_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}
