// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP server and per-connection sessions.

use std::net::SocketAddr;
use std::time::Duration;

use lg_core::SequencedChange;
use thiserror::Error;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::actor::{Caller, CoordinatorError, CoordinatorHandle};
use crate::broadcast::ChangeReceiver;
use crate::protocol::{
    self, ClientFrame, ProtocolError, Request, Response, Role, ServerFrame, DEFAULT_TIMEOUT,
    PROTOCOL_VERSION,
};

/// Per-connection timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Drop a session that sends nothing (not even `Ping`) for this long
    pub session_timeout: Duration,
    /// Bound on writing one frame
    pub write_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(30),
            write_timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),
    #[error("session idle for {0:?}")]
    Idle(Duration),
    #[error("handshake failed: {0}")]
    Handshake(String),
}

/// Accept connections until the task is dropped
///
/// Sessions run in a `JoinSet` owned by this future, so aborting the
/// accept loop also ends every session.
pub async fn serve(listener: TcpListener, handle: CoordinatorHandle, config: SessionConfig) {
    let mut sessions = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    sessions.spawn(run_session(stream, peer, handle.clone(), config));
                }
                Err(e) => error!("error accepting connection: {}", e),
            },
            Some(_) = sessions.join_next() => {}
        }
    }
}

async fn run_session(
    stream: TcpStream,
    peer: SocketAddr,
    handle: CoordinatorHandle,
    config: SessionConfig,
) {
    debug!(%peer, "connection opened");
    let _ = stream.set_nodelay(true);
    let (reader, writer) = stream.into_split();
    let (frames_tx, frames) = mpsc::channel(64);
    let reader_task = tokio::spawn(read_frames(reader, frames_tx));

    let mut session = Session {
        handle,
        config,
        writer,
        caller: None,
    };
    let result = session.run(frames).await;
    reader_task.abort();

    let who = session
        .caller
        .as_ref()
        .map(|c| format!("{} {}", c.role, c.identity))
        .unwrap_or_else(|| "anonymous".to_string());
    match &result {
        Ok(()) => info!(%peer, session = %who, "session closed"),
        Err(e) => warn!(%peer, session = %who, error = %e, "session ended"),
    }

    if let Some(caller) = &session.caller {
        if caller.role == Role::Exporter {
            if let Err(e) = session.handle.exporter_gone(&caller.identity).await {
                error!(exporter = %caller.identity, error = %e, "failed to drop exporter resources");
            }
        }
    }
}

/// Forward decoded frames to the session; ends after the first error
async fn read_frames(
    mut reader: OwnedReadHalf,
    tx: mpsc::Sender<Result<ClientFrame, ProtocolError>>,
) {
    loop {
        let frame = protocol::read_frame(&mut reader).await;
        let failed = frame.is_err();
        if tx.send(frame).await.is_err() || failed {
            return;
        }
    }
}

async fn next_change(changes: &mut Option<ChangeReceiver>) -> Option<SequencedChange> {
    match changes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

struct Session {
    handle: CoordinatorHandle,
    config: SessionConfig,
    writer: OwnedWriteHalf,
    /// Set by a successful `Hello`
    caller: Option<Caller>,
}

impl Session {
    async fn run(
        &mut self,
        mut frames: mpsc::Receiver<Result<ClientFrame, ProtocolError>>,
    ) -> Result<(), ServerError> {
        let mut changes: Option<ChangeReceiver> = None;
        let mut deadline = Instant::now() + self.config.session_timeout;

        loop {
            tokio::select! {
                frame = frames.recv() => {
                    let frame = match frame {
                        None | Some(Err(ProtocolError::ConnectionClosed)) => return Ok(()),
                        Some(Err(e)) => return Err(e.into()),
                        Some(Ok(frame)) => frame,
                    };
                    deadline = Instant::now() + self.config.session_timeout;
                    self.dispatch(frame, &mut changes).await?;
                }
                change = next_change(&mut changes) => match change {
                    Some(change) => self.write(&ServerFrame::Change { change }).await?,
                    // The actor is gone; requests will report it
                    None => changes = None,
                },
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(ServerError::Idle(self.config.session_timeout));
                }
            }
        }
    }

    async fn dispatch(
        &mut self,
        frame: ClientFrame,
        changes: &mut Option<ChangeReceiver>,
    ) -> Result<(), ServerError> {
        let ClientFrame { id, request } = frame;
        debug!(id, request = request.name(), "request");

        let Some(caller) = self.caller.clone() else {
            return self.handshake(id, request).await;
        };

        let response = match request {
            Request::Hello { .. } => Response::user_error("session already said hello"),
            Request::Join => {
                let (tx, rx) = mpsc::unbounded_channel();
                let snapshot = self.handle.join(tx).await?;
                // The snapshot goes out before anything queued after it
                self.respond(id, Response::Snapshot { snapshot }).await?;
                *changes = Some(rx);
                return Ok(());
            }
            Request::Ping => Response::Pong,
            Request::GetResources => Response::Resources {
                resources: self.handle.snapshot().resources.clone(),
            },
            Request::GetPlaces => Response::Places {
                places: self.handle.snapshot().places.clone(),
            },
            Request::GetReservations => Response::Reservations {
                reservations: self.handle.snapshot().reservations.clone(),
            },
            request => match self.handle.request(caller, request).await {
                Ok(response) => response,
                Err(e) => Response::server_error(e.to_string()),
            },
        };

        // Flush changes the request caused before answering it
        if let Some(rx) = changes.as_mut() {
            while let Ok(change) = rx.try_recv() {
                self.write(&ServerFrame::Change { change }).await?;
            }
        }
        self.respond(id, response).await
    }

    async fn handshake(&mut self, id: u64, request: Request) -> Result<(), ServerError> {
        let request_name = request.name();
        let Request::Hello {
            role,
            name,
            version,
        } = request
        else {
            self.respond(id, Response::user_error("expected hello"))
                .await?;
            return Err(ServerError::Handshake(format!(
                "{} before hello",
                request_name
            )));
        };

        if version != PROTOCOL_VERSION {
            let message = format!(
                "protocol version {} is not supported (coordinator speaks {})",
                version, PROTOCOL_VERSION
            );
            self.respond(id, Response::user_error(message.clone()))
                .await?;
            return Err(ServerError::Handshake(message));
        }
        if name.is_empty() {
            self.respond(id, Response::user_error("hello requires a name"))
                .await?;
            return Err(ServerError::Handshake("empty name".into()));
        }

        if role == Role::Exporter {
            if let Err(e) = self.handle.register_exporter(&name).await? {
                let response = Response::Error {
                    kind: e.kind(),
                    message: e.to_string(),
                };
                self.respond(id, response).await?;
                return Err(ServerError::Handshake(e.to_string()));
            }
        }

        info!(role = %role, name = %name, "session started");
        self.caller = Some(Caller {
            identity: name,
            role,
        });
        self.respond(
            id,
            Response::Hello {
                version: PROTOCOL_VERSION.to_string(),
            },
        )
        .await
    }

    async fn respond(&mut self, id: u64, response: Response) -> Result<(), ServerError> {
        self.write(&ServerFrame::Response { id, response }).await
    }

    async fn write(&mut self, frame: &ServerFrame) -> Result<(), ServerError> {
        protocol::write_frame(&mut self.writer, frame, self.config.write_timeout).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
