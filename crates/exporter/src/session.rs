// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The exporter's connection to the coordinator
//!
//! Each connection starts with a full `SyncResources`, so nothing is assumed
//! about updates that were in flight when a previous connection died.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use lg_coordinator::protocol::{self, DEFAULT_TIMEOUT};
use lg_coordinator::{
    ClientFrame, ProtocolError, Request, Response, Role, ServerFrame, PROTOCOL_VERSION,
};
use lg_core::{Clock, Coalescer, ResourcePath, ResourceUpdate, SystemClock};
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, ExporterConfig, ResourceDecl};
use crate::probe::Probe;

/// First reconnect delay
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Reconnect delay ceiling
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("cannot reach coordinator at {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("coordinator rejected {request}: {message}")]
    Rejected {
        request: &'static str,
        message: String,
    },
    #[error("unexpected response to {request}: {response}")]
    Unexpected {
        request: &'static str,
        response: String,
    },
}

/// Delay before the reconnect attempt after one that waited `current`
pub fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

/// An open, handshaken connection
pub struct Link {
    stream: TcpStream,
    next_id: u64,
    timeout: Duration,
}

impl Link {
    async fn call(&mut self, request: Request) -> Result<Response, ExporterError> {
        let id = self.next_id;
        self.next_id += 1;
        let name = request.name();
        protocol::write_frame(&mut self.stream, &ClientFrame { id, request }, self.timeout)
            .await?;

        loop {
            let frame: ServerFrame =
                tokio::time::timeout(self.timeout, protocol::read_frame(&mut self.stream))
                    .await
                    .map_err(|_| ProtocolError::Timeout)??;
            match frame {
                ServerFrame::Response { id: got, response } if got == id => {
                    return match response {
                        Response::Error { message, .. } => Err(ExporterError::Rejected {
                            request: name,
                            message,
                        }),
                        response => Ok(response),
                    };
                }
                // Exporters never join, but tolerate stray frames
                other => debug!(?other, "ignoring frame"),
            }
        }
    }

    async fn expect_ok(&mut self, request: Request) -> Result<(), ExporterError> {
        let name = request.name();
        match self.call(request).await? {
            Response::Ok => Ok(()),
            other => Err(ExporterError::Unexpected {
                request: name,
                response: format!("{:?}", other),
            }),
        }
    }
}

pub struct Exporter<P: Probe> {
    config: ExporterConfig,
    resources: Vec<ResourceDecl>,
    probe: P,
}

impl<P: Probe> Exporter<P> {
    pub fn new(config: ExporterConfig, probe: P) -> Result<Self, ConfigError> {
        let resources = config.resources()?;
        Ok(Self {
            config,
            resources,
            probe,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Probe every resource now
    pub fn survey(&self) -> Vec<ResourceUpdate> {
        self.resources
            .iter()
            .map(|decl| ResourceUpdate {
                path: decl.path.clone(),
                params: decl.params.clone(),
                avail: self.probe.available(decl),
            })
            .collect()
    }

    /// Keep publishing until `shutdown` resolves
    pub async fn run_until<F: Future<Output = ()>>(&self, shutdown: F) {
        tokio::select! {
            _ = self.run() => {}
            _ = shutdown => info!(exporter = %self.config.name, "exporter stopping"),
        }
    }

    /// Connect, publish and reconnect forever
    pub async fn run(&self) {
        let mut backoff = INITIAL_BACKOFF;
        loop {
            match self.connect().await {
                Ok((link, published)) => {
                    backoff = INITIAL_BACKOFF;
                    let e = self.serve(link, published).await;
                    warn!(exporter = %self.config.name, error = %e, "connection lost");
                }
                Err(e) => warn!(exporter = %self.config.name, error = %e, "connect failed"),
            }
            debug!(delay_ms = backoff.as_millis() as u64, "reconnecting");
            tokio::time::sleep(backoff).await;
            backoff = next_backoff(backoff);
        }
    }

    /// Handshake and publish the full resource set
    pub async fn connect(&self) -> Result<(Link, HashMap<ResourcePath, bool>), ExporterError> {
        let addr = &self.config.coordinator;
        let stream = tokio::time::timeout(DEFAULT_TIMEOUT, TcpStream::connect(addr.as_str()))
            .await
            .map_err(|_| ProtocolError::Timeout)?
            .map_err(|source| ExporterError::Connect {
                addr: addr.clone(),
                source,
            })?;
        let _ = stream.set_nodelay(true);
        let mut link = Link {
            stream,
            next_id: 1,
            timeout: DEFAULT_TIMEOUT,
        };

        match link
            .call(Request::Hello {
                role: Role::Exporter,
                name: self.config.name.clone(),
                version: PROTOCOL_VERSION.to_string(),
            })
            .await?
        {
            Response::Hello { .. } => {}
            other => {
                return Err(ExporterError::Unexpected {
                    request: "hello",
                    response: format!("{:?}", other),
                })
            }
        }

        let resources = self.survey();
        let published = resources
            .iter()
            .map(|u| (u.path.clone(), u.avail))
            .collect();
        let count = resources.len();
        link.expect_ok(Request::SyncResources { resources }).await?;
        info!(exporter = %self.config.name, coordinator = %addr, resources = count, "published resources");
        Ok((link, published))
    }

    /// Poll and heartbeat until the connection fails
    async fn serve(&self, mut link: Link, mut published: HashMap<ResourcePath, bool>) -> ExporterError {
        let clock = SystemClock;
        let mut observed = published.clone();
        let mut pending = Coalescer::new(self.config.coalesce_window, self.resources.len());
        let mut poll = tokio::time::interval(self.config.poll_interval.max(MIN_INTERVAL));
        let mut heartbeat =
            tokio::time::interval(self.config.heartbeat_interval.max(MIN_INTERVAL));
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    let now = clock.now();
                    let mut full = false;
                    for update in self.survey() {
                        if observed.get(&update.path) != Some(&update.avail) {
                            observed.insert(update.path.clone(), update.avail);
                            full |= pending.push(update.path.clone(), update, now);
                        }
                    }
                    let ready = if full { pending.drain_all() } else { pending.drain_ready(now) };
                    for (path, update) in ready {
                        // Flapped back before the window closed
                        if published.get(&path) == Some(&update.avail) {
                            continue;
                        }
                        let avail = update.avail;
                        if let Err(e) = link.expect_ok(Request::UpsertResource { resource: update }).await {
                            return e;
                        }
                        info!(resource = %path, avail, "availability changed");
                        published.insert(path, avail);
                    }
                }
                _ = heartbeat.tick() => {
                    match link.call(Request::Ping).await {
                        Ok(Response::Pong) => {}
                        Ok(other) => {
                            return ExporterError::Unexpected {
                                request: "ping",
                                response: format!("{:?}", other),
                            }
                        }
                        Err(e) => return e,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
