// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator lifecycle management: configuration, startup, shutdown.

use std::fs::File;
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use lg_core::{Registry, RegistryConfig, SchedulerConfig, SystemClock, TokenIdGen};
use lg_storage::{PlaceStore, StoreError};
use serde::Deserialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::actor::{CoordinatorActor, CoordinatorError, CoordinatorHandle};
use crate::protocol::{DEFAULT_PORT, DEFAULT_TIMEOUT};
use crate::server::{self, SessionConfig};

/// Coordinator configuration, loaded from TOML
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address to accept sessions on
    pub listen: SocketAddr,
    /// Directory for the place log, lock file and log file; in-memory only
    /// when unset
    pub state_dir: Option<PathBuf>,
    /// Idle time after which a silent session is dropped
    #[serde(with = "humantime_serde")]
    pub session_timeout: Duration,
    /// How long sessions wait for the actor
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,
    /// Period of the reservation sweep
    #[serde(with = "humantime_serde")]
    pub schedule_interval: Duration,
    pub registry: RegistryConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            state_dir: None,
            session_timeout: Duration::from_secs(30),
            call_timeout: Duration::from_secs(10),
            schedule_interval: Duration::from_secs(1),
            registry: RegistryConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Config {
    pub const LOCK_FILE: &'static str = "coordinator.pid";

    pub fn load(path: &Path) -> Result<Self, LifecycleError> {
        let text = std::fs::read_to_string(path).map_err(|source| LifecycleError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| LifecycleError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn lock_path(&self) -> Option<PathBuf> {
        self.state_dir.as_ref().map(|dir| dir.join(Self::LOCK_FILE))
    }

    fn session(&self) -> SessionConfig {
        SessionConfig {
            session_timeout: self.session_timeout,
            write_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to read config {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to acquire lock: coordinator already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    #[error("place store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A running coordinator
pub struct Coordinator {
    config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    lock_file: Option<File>,
    local_addr: SocketAddr,
    handle: CoordinatorHandle,
    actor: JoinHandle<()>,
    server: JoinHandle<()>,
    ticker: JoinHandle<()>,
}

impl Coordinator {
    /// Address the listener actually bound (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> &CoordinatorHandle {
        &self.handle
    }

    /// Serve until `shutdown` resolves, then shut down
    pub async fn run_until<F: Future<Output = ()>>(self, shutdown: F) -> Result<(), LifecycleError> {
        shutdown.await;
        self.shutdown().await
    }

    pub async fn shutdown(self) -> Result<(), LifecycleError> {
        info!("shutting down coordinator...");

        // 1. Stop accepting; dropping the server future ends every session
        self.server.abort();
        self.ticker.abort();
        let _ = self.server.await;
        let _ = self.ticker.await;

        // 2. The actor stops once the last handle is gone
        drop(self.handle);
        if tokio::time::timeout(DEFAULT_TIMEOUT, self.actor).await.is_err() {
            warn!("coordinator actor did not stop in time");
        }

        // 3. Remove PID file; the lock is released when the file is dropped
        if let Some(lock_path) = self.config.lock_path() {
            if let Err(e) = std::fs::remove_file(&lock_path) {
                warn!("failed to remove PID file: {}", e);
            }
        }
        drop(self.lock_file);

        info!("coordinator shutdown complete");
        Ok(())
    }
}

/// Start the coordinator
pub async fn startup(config: &Config) -> Result<Coordinator, LifecycleError> {
    match startup_inner(config).await {
        Ok(coordinator) => Ok(coordinator),
        Err(e) => {
            // Never remove a PID file another coordinator holds
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<Coordinator, LifecycleError> {
    // 1. Acquire lock file FIRST - prevents two coordinators sharing a log
    let lock_file = match (&config.state_dir, config.lock_path()) {
        (Some(dir), Some(lock_path)) => {
            std::fs::create_dir_all(dir)?;
            let lock_file = File::options()
                .write(true)
                .create(true)
                .truncate(false)
                .open(&lock_path)?;
            lock_file
                .try_lock_exclusive()
                .map_err(LifecycleError::LockFailed)?;
            lock_file.set_len(0)?;
            use std::io::Write;
            writeln!(&lock_file, "{}", std::process::id())?;
            Some(lock_file)
        }
        _ => None,
    };

    // 2. Rebuild places from the log
    let mut registry = Registry::new(config.registry.clone());
    let store = match &config.state_dir {
        Some(dir) => {
            let (store, report) = PlaceStore::open(dir, &mut registry)?;
            info!(
                "loaded {} places ({} entries skipped) from {}",
                report.places,
                report.skipped,
                store.path().display()
            );
            Some(store)
        }
        None => {
            warn!("no state directory configured; places will not survive a restart");
            None
        }
    };

    // 3. Bind (LAST - only after all validation passes)
    let listener = TcpListener::bind(config.listen)
        .await
        .map_err(|e| LifecycleError::BindFailed(config.listen, e))?;
    let local_addr = listener.local_addr()?;

    // 4. Start the actor, the reservation sweep and the accept loop
    let actor = CoordinatorActor::new(
        registry,
        store,
        SystemClock,
        TokenIdGen,
        config.scheduler.clone(),
    );
    let (handle, actor) = actor.spawn(config.call_timeout);
    let ticker = tokio::spawn(sweep(handle.clone(), config.schedule_interval));
    let server = tokio::spawn(server::serve(listener, handle.clone(), config.session()));

    info!("coordinator listening on {}", local_addr);

    Ok(Coordinator {
        config: config.clone(),
        lock_file,
        local_addr,
        handle,
        actor,
        server,
        ticker,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    if let Some(lock_path) = config.lock_path() {
        if lock_path.exists() {
            let _ = std::fs::remove_file(&lock_path);
        }
    }
}

/// Drive the periodic reservation sweep
async fn sweep(handle: CoordinatorHandle, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match handle.tick().await {
            Ok(()) => {}
            Err(CoordinatorError::ActorClosed) => return,
            Err(e) => warn!("reservation sweep skipped: {}", e),
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
