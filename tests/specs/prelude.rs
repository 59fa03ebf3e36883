//! Test helpers for behavioral specifications.
//!
//! A [`Lab`] serves a coordinator on an ephemeral port; exporters and
//! client sessions connect to it like they would in production.

#![allow(dead_code)]

pub use labgrid_client::{ClientError, ClientSession, SessionOptions};
pub use lg_core::resource::tree_get;
pub use lg_core::{ErrorKind, ResourcePath, Snapshot};
pub use std::collections::BTreeMap;
pub use std::time::Duration;

use lg_coordinator::protocol::DEFAULT_TIMEOUT;
use lg_coordinator::{lifecycle, Config, Coordinator};
use lg_exporter::{DeviceProbe, Exporter, ExporterConfig};
use tokio::task::JoinHandle;

/// Upper bound for anything a test waits on
pub const WAIT: Duration = Duration::from_secs(5);

/// Resources of the default test exporter
pub const BOARD: &str = r#"
[group.board]
NetworkSerialPort = { name = "console", host = "exp1", port = 4000 }
NetworkPowerPort = { name = "power", model = "fake", host = "pdu", index = 3, powered = true }
"#;

pub struct Lab {
    coordinator: Coordinator,
}

impl Lab {
    pub async fn start() -> Self {
        let config = Config {
            listen: "127.0.0.1:0".parse().unwrap(),
            ..Config::default()
        };
        let coordinator = lifecycle::startup(&config).await.expect("coordinator starts");
        Self { coordinator }
    }

    pub fn addr(&self) -> String {
        self.coordinator.local_addr().to_string()
    }

    /// The coordinator's own view
    pub fn snapshot(&self) -> Snapshot {
        self.coordinator.handle().snapshot().as_ref().clone()
    }

    /// Join as `test/<user>`
    pub async fn client(&self, user: &str) -> ClientSession {
        let options = SessionOptions {
            identity: format!("test/{}", user),
            timeout: DEFAULT_TIMEOUT,
            heartbeat: None,
        };
        ClientSession::join(&self.addr(), options)
            .await
            .expect("client joins")
    }

    /// Run an exporter publishing the `[group.*]` tables in `groups`
    pub fn exporter(&self, name: &str, groups: &str) -> ExporterTask {
        let config: ExporterConfig = toml::from_str(&format!(
            "name = \"{}\"\ncoordinator = \"{}\"\npoll_interval = \"10ms\"\ncoalesce_window = \"20ms\"\n{}",
            name,
            self.addr(),
            groups
        ))
        .expect("valid exporter config");
        let exporter = Exporter::new(config, DeviceProbe).expect("valid exporter resources");
        ExporterTask {
            task: tokio::spawn(async move { exporter.run().await }),
        }
    }
}

/// A running exporter; dropping it disconnects
pub struct ExporterTask {
    task: JoinHandle<()>,
}

impl ExporterTask {
    /// Drop the coordinator connection as a crashed exporter would
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for ExporterTask {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn path(exporter: &str, group: &str, cls: &str, name: &str) -> ResourcePath {
    ResourcePath::new(exporter, group, cls, name)
}

pub fn console(exporter: &str) -> ResourcePath {
    path(exporter, "board", "NetworkSerialPort", "console")
}

/// Wait until `session` sees `path` with the given availability
pub async fn wait_avail(session: &ClientSession, path: &ResourcePath, avail: bool) {
    session
        .wait_for(WAIT, |s| {
            tree_get(&s.resources, path).is_some_and(|e| e.avail == avail)
        })
        .await
        .unwrap_or_else(|e| panic!("{} never became avail={}: {}", path, avail, e));
}

/// Create `name` matching every resource of `exporter`'s board group
pub async fn board_place(session: &ClientSession, name: &str, exporter: &str) {
    session.add_place(name).await.unwrap();
    session
        .add_match(name, &format!("{}/board/*", exporter), None)
        .await
        .unwrap();
}

/// Panic unless `result` is a coordinator rejection of `kind`
pub fn assert_rejected<T: std::fmt::Debug>(result: Result<T, ClientError>, kind: ErrorKind) {
    match result {
        Err(ClientError::Rejected { kind: got, .. }) => assert_eq!(got, kind),
        other => panic!("expected a {:?} rejection, got {:?}", kind, other),
    }
}
