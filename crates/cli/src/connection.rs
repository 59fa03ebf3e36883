// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent connection to the coordinator
//!
//! One reader task owns the read half. It applies pushed changes to the
//! mirror and hands responses to whichever call is waiting on that id. The
//! coordinator writes a session's queued changes before the response to its
//! request, so by the time a call returns the mirror already reflects it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lg_coordinator::protocol;
use lg_coordinator::{ClientFrame, ProtocolError, Request, Response, ServerFrame};
use lg_core::Snapshot;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ClientError;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for a single request (`LG_TIMEOUT_MS`)
pub fn timeout_request() -> Duration {
    parse_duration_ms("LG_TIMEOUT_MS").unwrap_or(Duration::from_secs(10))
}

/// Interval between keepalive pings (`LG_HEARTBEAT_MS`)
pub fn heartbeat_interval() -> Duration {
    parse_duration_ms("LG_HEARTBEAT_MS").unwrap_or(Duration::from_secs(10))
}

type Waiters = Mutex<HashMap<u64, oneshot::Sender<Response>>>;

struct Shared {
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    waiters: Waiters,
    next_id: AtomicU64,
    timeout: Duration,
}

impl Shared {
    async fn call(&self, request: Request) -> Result<Response, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = request.name();
        let (tx, rx) = oneshot::channel();
        self.waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);

        let written = {
            let mut writer = self.writer.lock().await;
            protocol::write_frame(&mut *writer, &ClientFrame { id, request }, self.timeout).await
        };
        if let Err(e) = written {
            self.forget(id);
            return Err(e.into());
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Err(_) => {
                self.forget(id);
                Err(ClientError::Timeout { request: name })
            }
            Ok(Err(_)) => Err(ClientError::Disconnected),
            Ok(Ok(Response::Error { kind, message })) => Err(ClientError::Rejected {
                request: name,
                kind,
                message,
            }),
            Ok(Ok(response)) => Ok(response),
        }
    }

    fn forget(&self, id: u64) {
        self.waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }
}

pub struct Connection {
    shared: Arc<Shared>,
    mirror: watch::Receiver<Snapshot>,
    reader: JoinHandle<()>,
    heartbeat: Option<JoinHandle<()>>,
}

impl Connection {
    /// Connect to `addr` (`host:port`)
    pub async fn open(addr: &str, timeout: Duration) -> Result<Self, ClientError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ClientError::Timeout { request: "connect" })?
            .map_err(|source| ClientError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();

        let shared = Arc::new(Shared {
            writer: tokio::sync::Mutex::new(write_half),
            waiters: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            timeout,
        });
        let (mirror_tx, mirror) = watch::channel(Snapshot::default());
        let reader = tokio::spawn(read_loop(read_half, Arc::clone(&shared), mirror_tx));

        debug!(%addr, "connected to coordinator");
        Ok(Self {
            shared,
            mirror,
            reader,
            heartbeat: None,
        })
    }

    /// Send `Ping` every `interval` while the connection is open
    pub fn start_heartbeat(&mut self, interval: Duration) {
        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = shared.call(Request::Ping).await {
                    debug!(error = %e, "heartbeat stopped");
                    break;
                }
            }
        });
        if let Some(old) = self.heartbeat.replace(task) {
            old.abort();
        }
    }

    /// Send a request and wait for its response
    ///
    /// `Response::Error` comes back as [`ClientError::Rejected`].
    pub async fn call(&self, request: Request) -> Result<Response, ClientError> {
        self.shared.call(request).await
    }

    /// Receiver for the mirrored coordinator state
    pub fn mirror(&self) -> watch::Receiver<Snapshot> {
        self.mirror.clone()
    }

    /// Whether the reader has seen the connection close
    pub fn is_closed(&self) -> bool {
        self.reader.is_finished()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
    }
}

async fn read_loop(mut reader: OwnedReadHalf, shared: Arc<Shared>, mirror: watch::Sender<Snapshot>) {
    loop {
        let frame: ServerFrame = match protocol::read_frame(&mut reader).await {
            Ok(frame) => frame,
            Err(ProtocolError::ConnectionClosed) => {
                debug!("coordinator closed the connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "connection to coordinator failed");
                break;
            }
        };

        match frame {
            ServerFrame::Change { change } => {
                mirror.send_if_modified(|snapshot| snapshot.apply(&change));
            }
            ServerFrame::Response { id, response } => {
                // Installed here so changes read next land on top of it
                if let Response::Snapshot { snapshot } = &response {
                    mirror.send_replace(snapshot.clone());
                }
                let waiter = shared
                    .waiters
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => debug!(id, "response nobody waits for"),
                }
            }
        }
    }

    // Wake every pending call with `Disconnected`
    shared
        .waiters
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clear();
}
