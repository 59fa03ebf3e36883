// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single writer behind the coordinator
//!
//! One task owns the [`Registry`]. Sessions, the reservation ticker and
//! exporter liveness cleanup all reach it through [`CoordinatorHandle`],
//! so mutations are applied one at a time in arrival order and every
//! committed change is broadcast in that same order.

use crate::broadcast::{Broadcast, ChangeSender};
use crate::protocol::{Request, Response, Role};
use lg_core::{
    schedule, Change, Clock, IdGen, Operation, Registry, RegistryError, Reservation,
    SchedulerConfig, Snapshot, Timestamp,
};
use lg_storage::PlaceStore;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Default bound on how long a caller waits for the actor
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the command queue
pub const COMMAND_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("coordinator did not answer within {0:?}")]
    Timeout(Duration),
    #[error("coordinator is not running")]
    ActorClosed,
    #[error("coordinator dropped the request")]
    ActorDropped,
}

/// Who issued a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub identity: String,
    pub role: Role,
}

impl Caller {
    pub fn client(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            role: Role::Client,
        }
    }

    pub fn exporter(name: impl Into<String>) -> Self {
        Self {
            identity: name.into(),
            role: Role::Exporter,
        }
    }
}

pub enum Command {
    Request {
        caller: Caller,
        request: Request,
        reply: oneshot::Sender<Response>,
    },
    /// Subscribe and capture the snapshot in one step
    Join {
        subscriber: ChangeSender,
        reply: oneshot::Sender<Snapshot>,
    },
    RegisterExporter {
        name: String,
        reply: oneshot::Sender<Result<(), RegistryError>>,
    },
    ExporterGone {
        name: String,
        reply: oneshot::Sender<()>,
    },
    /// Periodic reservation sweep
    Tick,
}

/// Cloneable access to the coordinator actor
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
    snapshot: watch::Receiver<Arc<Snapshot>>,
    call_timeout: Duration,
}

impl CoordinatorHandle {
    pub(crate) fn new(
        tx: mpsc::Sender<Command>,
        snapshot: watch::Receiver<Arc<Snapshot>>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            tx,
            snapshot,
            call_timeout,
        }
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, CoordinatorError> {
        let (reply, response) = oneshot::channel();
        let exchange = async {
            self.tx
                .send(make(reply))
                .await
                .map_err(|_| CoordinatorError::ActorClosed)?;
            response.await.map_err(|_| CoordinatorError::ActorDropped)
        };
        tokio::time::timeout(self.call_timeout, exchange)
            .await
            .map_err(|_| CoordinatorError::Timeout(self.call_timeout))?
    }

    /// Run a request through the single mutation path
    pub async fn request(
        &self,
        caller: Caller,
        request: Request,
    ) -> Result<Response, CoordinatorError> {
        self.call(|reply| Command::Request {
            caller,
            request,
            reply,
        })
        .await
    }

    /// Subscribe to changes; returns the snapshot the subscription starts after
    pub async fn join(&self, subscriber: ChangeSender) -> Result<Snapshot, CoordinatorError> {
        self.call(|reply| Command::Join { subscriber, reply }).await
    }

    pub async fn register_exporter(
        &self,
        name: &str,
    ) -> Result<Result<(), RegistryError>, CoordinatorError> {
        let name = name.to_string();
        self.call(|reply| Command::RegisterExporter { name, reply })
            .await
    }

    pub async fn exporter_gone(&self, name: &str) -> Result<(), CoordinatorError> {
        let name = name.to_string();
        self.call(|reply| Command::ExporterGone { name, reply }).await
    }

    pub async fn tick(&self) -> Result<(), CoordinatorError> {
        tokio::time::timeout(self.call_timeout, self.tx.send(Command::Tick))
            .await
            .map_err(|_| CoordinatorError::Timeout(self.call_timeout))?
            .map_err(|_| CoordinatorError::ActorClosed)
    }

    /// The latest committed state, without entering the actor
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.borrow())
    }
}

/// What a successful request answers with, once scheduling has run
enum Reply {
    Ok,
    Reservation(String),
}

pub struct CoordinatorActor<C: Clock, I: IdGen> {
    registry: Registry,
    broadcast: Broadcast,
    store: Option<PlaceStore>,
    clock: C,
    ids: I,
    scheduler: SchedulerConfig,
    snapshot: watch::Sender<Arc<Snapshot>>,
}

impl<C: Clock + 'static, I: IdGen + 'static> CoordinatorActor<C, I> {
    pub fn new(
        registry: Registry,
        store: Option<PlaceStore>,
        clock: C,
        ids: I,
        scheduler: SchedulerConfig,
    ) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(registry.snapshot(0)));
        Self {
            registry,
            broadcast: Broadcast::new(),
            store,
            clock,
            ids,
            scheduler,
            snapshot,
        }
    }

    /// Start the actor task
    pub fn spawn(self, call_timeout: Duration) -> (CoordinatorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let handle = CoordinatorHandle::new(tx, self.snapshot.subscribe(), call_timeout);
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        tracing::debug!("coordinator actor stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Request {
                caller,
                request,
                reply,
            } => {
                let response = self.handle_request(&caller, request);
                let _ = reply.send(response);
            }
            Command::Join { subscriber, reply } => {
                self.broadcast.subscribe(subscriber);
                let snapshot = self.registry.snapshot(self.broadcast.seq());
                let _ = reply.send(snapshot);
            }
            Command::RegisterExporter { name, reply } => {
                let result = self.registry.register_exporter(&name);
                match &result {
                    Ok(()) => tracing::info!(exporter = %name, "exporter connected"),
                    Err(e) => tracing::warn!(exporter = %name, error = %e, "exporter rejected"),
                }
                let registered = result.is_ok();
                // The session gave up waiting and will never report the exporter gone
                if reply.send(result).is_err() && registered {
                    tracing::warn!(exporter = %name, "handshake abandoned, unregistering");
                    let changes = self.registry.remove_exporter(&name);
                    self.commit(changes);
                }
            }
            Command::ExporterGone { name, reply } => {
                let changes = self.registry.remove_exporter(&name);
                tracing::info!(exporter = %name, changes = changes.len(), "exporter disconnected");
                self.commit(changes);
                let _ = reply.send(());
            }
            Command::Tick => {
                let changes = schedule(&mut self.registry, self.clock.now(), &self.scheduler);
                self.commit(changes);
            }
        }
    }

    fn handle_request(&mut self, caller: &Caller, request: Request) -> Response {
        let name = request.name();
        match (caller.role, request.is_exporter_only()) {
            (Role::Client, true) => {
                return Response::user_error(format!("{} is reserved for exporters", name))
            }
            (Role::Exporter, false) => {
                return Response::user_error(format!("{} is not available to exporters", name))
            }
            _ => {}
        }
        let now = self.clock.now();
        match self.execute(caller, request, now) {
            Ok((mut changes, reply)) => {
                tracing::info!(identity = %caller.identity, request = name, "request committed");
                changes.extend(schedule(&mut self.registry, now, &self.scheduler));
                self.commit(changes);
                match reply {
                    Reply::Ok => Response::Ok,
                    Reply::Reservation(token) => match self.registry.reservation(&token) {
                        Some(reservation) => Response::Reservation {
                            reservation: reservation.clone(),
                        },
                        None => Response::server_error(format!("reservation {} vanished", token)),
                    },
                }
            }
            Err(e) => {
                tracing::info!(
                    identity = %caller.identity,
                    request = name,
                    error = %e,
                    "request rejected"
                );
                Response::Error {
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
        }
    }

    fn execute(
        &mut self,
        caller: &Caller,
        request: Request,
        now: Timestamp,
    ) -> Result<(Vec<Change>, Reply), RegistryError> {
        let identity = caller.identity.as_str();
        if let Some(op) = place_operation(&request, now) {
            let changes = op.apply(&mut self.registry)?;
            self.persist(&op);
            return Ok((changes, Reply::Ok));
        }

        let changes = match request {
            Request::AcquirePlace { place } => self.registry.acquire(&place, identity, now)?,
            Request::ReleasePlace { place, force } => {
                self.registry.release(&place, identity, force, now)?
            }
            Request::AllowPlace { place, user } => {
                self.registry.allow(&place, identity, &user, now)?
            }
            Request::DisallowPlace { place, user } => {
                self.registry.disallow(&place, identity, &user, now)?
            }
            Request::CreateReservation { filters, prio } => {
                let token = self.ids.next();
                let reservation = Reservation::new(
                    token.clone(),
                    identity,
                    prio,
                    filters,
                    now,
                    self.scheduler.deadline(now),
                );
                let changes = self.registry.create_reservation(reservation)?;
                return Ok((changes, Reply::Reservation(token)));
            }
            Request::CancelReservation { token } => {
                self.registry.cancel_reservation(&token, identity)?
            }
            Request::PollReservation { token } => {
                let deadline = self.scheduler.deadline(now);
                let changes = self.registry.poll_reservation(&token, identity, deadline)?;
                return Ok((changes, Reply::Reservation(token)));
            }
            Request::SyncResources { resources } => {
                self.registry.sync_exporter(identity, resources)?
            }
            Request::UpsertResource { resource } => {
                if resource.path.exporter != identity {
                    return Err(RegistryError::InvalidResource(resource.path));
                }
                self.registry.upsert_resource(resource)?
            }
            Request::RemoveResource { path } => {
                if path.exporter != identity {
                    return Err(RegistryError::InvalidResource(path));
                }
                self.registry.remove_resource(&path)?
            }
            // Session-level requests never reach the actor
            Request::Hello { .. }
            | Request::Join
            | Request::Ping
            | Request::GetResources
            | Request::GetPlaces
            | Request::GetReservations => Vec::new(),
            // Administrative place requests are handled by `place_operation` above
            Request::AddPlace { .. }
            | Request::DelPlace { .. }
            | Request::AddPlaceAlias { .. }
            | Request::DelPlaceAlias { .. }
            | Request::SetPlaceComment { .. }
            | Request::SetPlaceTags { .. }
            | Request::AddPlaceMatch { .. }
            | Request::DelPlaceMatch { .. } => Vec::new(),
        };
        Ok((changes, Reply::Ok))
    }

    fn persist(&mut self, op: &Operation) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        if let Err(e) = store.record(op) {
            // The registry already holds the change; it is lost on restart
            tracing::error!(?op, error = %e, "failed to persist place operation");
        }
    }

    /// Broadcast committed changes and publish the new snapshot
    fn commit(&mut self, changes: Vec<Change>) {
        if changes.is_empty() {
            return;
        }
        for change in changes {
            let sequenced = self.broadcast.publish(change);
            tracing::debug!(seq = sequenced.seq, topic = %sequenced.change.topic(), key = %sequenced.change.key(), "change");
        }
        let snapshot = self.registry.snapshot(self.broadcast.seq());
        self.snapshot.send_replace(Arc::new(snapshot));
    }
}

/// The persistable form of an administrative request
fn place_operation(request: &Request, at: Timestamp) -> Option<Operation> {
    let op = match request {
        Request::AddPlace { name } => Operation::AddPlace {
            name: name.clone(),
            at,
        },
        Request::DelPlace { name } => Operation::DelPlace { name: name.clone() },
        Request::AddPlaceAlias { place, alias } => Operation::AddAlias {
            place: place.clone(),
            alias: alias.clone(),
            at,
        },
        Request::DelPlaceAlias { place, alias } => Operation::DelAlias {
            place: place.clone(),
            alias: alias.clone(),
            at,
        },
        Request::SetPlaceComment { place, comment } => Operation::SetComment {
            place: place.clone(),
            comment: comment.clone(),
            at,
        },
        Request::SetPlaceTags { place, tags } => Operation::SetTags {
            place: place.clone(),
            tags: tags.clone(),
            at,
        },
        Request::AddPlaceMatch {
            place,
            pattern,
            rename,
        } => Operation::AddMatch {
            place: place.clone(),
            pattern: pattern.clone(),
            rename: rename.clone(),
            at,
        },
        Request::DelPlaceMatch { place, pattern } => Operation::DelMatch {
            place: place.clone(),
            pattern: pattern.clone(),
            at,
        },
        _ => return None,
    };
    Some(op)
}

#[cfg(test)]
#[path = "actor_tests.rs"]
mod tests;
