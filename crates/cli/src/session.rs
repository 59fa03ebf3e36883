// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client session: a joined connection plus its mirror of the coordinator

use std::collections::BTreeMap;
use std::time::Duration;

use lg_adapters::{PowerBackend, TracedPowerBackend};
use lg_coordinator::{Request, Response, Role, PROTOCOL_VERSION};
use lg_core::{
    Place, Reservation, ReservationState, ResourceTree, Snapshot, TagFilter,
};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::bindings::ResourceBindings;
use crate::connection::{heartbeat_interval, timeout_request, Connection};
use crate::console::{console_target, ConsoleTarget};
use crate::env::{build_env, DriverEnv};
use crate::error::ClientError;
use crate::power::power_backend;

/// Coordinator address used when none is configured
pub const DEFAULT_COORDINATOR: &str = "127.0.0.1:20408";

/// Interval between polls while waiting for a reservation
pub const RESERVATION_POLL: Duration = Duration::from_secs(1);

/// `host/user` identity presented in `Hello`
///
/// `LG_HOSTNAME` and `LG_USERNAME` override the host and user names.
pub fn default_identity() -> String {
    let var = |names: &[&str], fallback: &str| {
        names
            .iter()
            .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
            .unwrap_or_else(|| fallback.to_string())
    };
    format!(
        "{}/{}",
        var(&["LG_HOSTNAME", "HOSTNAME"], "localhost"),
        var(&["LG_USERNAME", "USER"], "unknown")
    )
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub identity: String,
    pub timeout: Duration,
    /// `None` disables keepalive pings
    pub heartbeat: Option<Duration>,
}

impl SessionOptions {
    /// Identity and timeouts from the environment
    pub fn from_env() -> Self {
        Self {
            identity: default_identity(),
            timeout: timeout_request(),
            heartbeat: Some(heartbeat_interval()),
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }
}

pub struct ClientSession {
    conn: Connection,
    identity: String,
    mirror: watch::Receiver<Snapshot>,
}

impl ClientSession {
    /// Connect, say hello and join the change stream
    pub async fn join(addr: &str, options: SessionOptions) -> Result<Self, ClientError> {
        let mut conn = Connection::open(addr, options.timeout).await?;
        let response = conn
            .call(Request::Hello {
                role: Role::Client,
                name: options.identity.clone(),
                version: PROTOCOL_VERSION.to_string(),
            })
            .await?;
        if !matches!(response, Response::Hello { .. }) {
            return Err(unexpected("hello", &response));
        }

        // The connection installs the snapshot before returning it
        let response = conn.call(Request::Join).await?;
        let Response::Snapshot { snapshot } = response else {
            return Err(unexpected("join", &response));
        };
        info!(identity = %options.identity, seq = snapshot.seq, places = snapshot.places.len(), "joined coordinator");

        if let Some(interval) = options.heartbeat {
            conn.start_heartbeat(interval);
        }
        let mirror = conn.mirror();
        Ok(Self {
            conn,
            identity: options.identity,
            mirror,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Copy of the mirrored state
    pub fn snapshot(&self) -> Snapshot {
        self.mirror.borrow().clone()
    }

    /// Sequence number of the last change applied to the mirror
    pub fn seq(&self) -> u64 {
        self.mirror.borrow().seq
    }

    pub fn places(&self) -> BTreeMap<String, Place> {
        self.mirror.borrow().places.clone()
    }

    pub fn resources(&self) -> ResourceTree {
        self.mirror.borrow().resources.clone()
    }

    pub fn reservations(&self) -> BTreeMap<String, Reservation> {
        self.mirror.borrow().reservations.clone()
    }

    pub fn is_connected(&self) -> bool {
        !self.conn.is_closed()
    }

    /// Look a place up by name, alias or unique substring
    pub fn find_place(&self, pattern: &str) -> Result<Place, ClientError> {
        find_place(&self.mirror.borrow().places, pattern)
    }

    /// Send a request that answers `Ok`
    pub async fn execute(&self, request: Request) -> Result<(), ClientError> {
        let name = request.name();
        match self.conn.call(request).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected(name, &other)),
        }
    }

    pub async fn add_place(&self, name: &str) -> Result<(), ClientError> {
        self.execute(Request::AddPlace {
            name: name.to_string(),
        })
        .await
    }

    pub async fn del_place(&self, name: &str) -> Result<(), ClientError> {
        self.execute(Request::DelPlace {
            name: name.to_string(),
        })
        .await
    }

    pub async fn add_alias(&self, place: &str, alias: &str) -> Result<(), ClientError> {
        self.execute(Request::AddPlaceAlias {
            place: place.to_string(),
            alias: alias.to_string(),
        })
        .await
    }

    pub async fn del_alias(&self, place: &str, alias: &str) -> Result<(), ClientError> {
        self.execute(Request::DelPlaceAlias {
            place: place.to_string(),
            alias: alias.to_string(),
        })
        .await
    }

    pub async fn set_comment(&self, place: &str, comment: &str) -> Result<(), ClientError> {
        self.execute(Request::SetPlaceComment {
            place: place.to_string(),
            comment: comment.to_string(),
        })
        .await
    }

    /// Merge `tags` into the place's tags; an empty value removes a tag
    pub async fn set_tags(&self, place: &str, tags: BTreeMap<String, String>) -> Result<(), ClientError> {
        self.execute(Request::SetPlaceTags {
            place: place.to_string(),
            tags,
        })
        .await
    }

    pub async fn add_match(
        &self,
        place: &str,
        pattern: &str,
        rename: Option<&str>,
    ) -> Result<(), ClientError> {
        self.execute(Request::AddPlaceMatch {
            place: place.to_string(),
            pattern: pattern.to_string(),
            rename: rename.map(str::to_string),
        })
        .await
    }

    pub async fn del_match(&self, place: &str, pattern: &str) -> Result<(), ClientError> {
        self.execute(Request::DelPlaceMatch {
            place: place.to_string(),
            pattern: pattern.to_string(),
        })
        .await
    }

    pub async fn acquire(&self, place: &str) -> Result<(), ClientError> {
        self.execute(Request::AcquirePlace {
            place: place.to_string(),
        })
        .await
    }

    /// Release a place; `force` releases another user's acquisition
    pub async fn release(&self, place: &str, force: bool) -> Result<(), ClientError> {
        self.execute(Request::ReleasePlace {
            place: place.to_string(),
            force,
        })
        .await
    }

    pub async fn allow(&self, place: &str, user: &str) -> Result<(), ClientError> {
        self.execute(Request::AllowPlace {
            place: place.to_string(),
            user: user.to_string(),
        })
        .await
    }

    pub async fn disallow(&self, place: &str, user: &str) -> Result<(), ClientError> {
        self.execute(Request::DisallowPlace {
            place: place.to_string(),
            user: user.to_string(),
        })
        .await
    }

    pub async fn create_reservation(
        &self,
        filters: BTreeMap<String, TagFilter>,
        prio: i64,
    ) -> Result<Reservation, ClientError> {
        self.reservation_call(Request::CreateReservation { filters, prio })
            .await
    }

    pub async fn cancel_reservation(&self, token: &str) -> Result<(), ClientError> {
        self.execute(Request::CancelReservation {
            token: token.to_string(),
        })
        .await
    }

    /// Keep a reservation alive and fetch its state
    pub async fn poll_reservation(&self, token: &str) -> Result<Reservation, ClientError> {
        self.reservation_call(Request::PollReservation {
            token: token.to_string(),
        })
        .await
    }

    /// Poll until the reservation is allocated (or acquired)
    ///
    /// Wakes early whenever the mirror changes. An expired reservation ends
    /// the wait with [`ClientError::ReservationEnded`].
    pub async fn wait_reservation(&self, token: &str) -> Result<Reservation, ClientError> {
        let mut changes = self.mirror.clone();
        loop {
            let reservation = self.poll_reservation(token).await?;
            match reservation.state {
                ReservationState::Allocated | ReservationState::Acquired => return Ok(reservation),
                ReservationState::Expired => {
                    return Err(ClientError::ReservationEnded {
                        token: token.to_string(),
                        state: reservation.state,
                    })
                }
                ReservationState::Waiting | ReservationState::Invalid => {
                    debug!(%token, state = %reservation.state, "waiting for allocation");
                }
            }
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        return Err(ClientError::Disconnected);
                    }
                }
                _ = tokio::time::sleep(RESERVATION_POLL) => {}
            }
        }
    }

    /// Driver environment of a place this session may use
    pub fn get_env(&self, place: &str) -> Result<DriverEnv, ClientError> {
        let snapshot = self.mirror.borrow();
        let place = self.accessible(&snapshot, place)?;
        build_env(place, &snapshot.resources)
    }

    /// Bind to the current resources of a place this session may use
    pub fn bind(&self, place: &str) -> Result<ResourceBindings, ClientError> {
        let snapshot = self.mirror.borrow();
        let place = self.accessible(&snapshot, place)?;
        ResourceBindings::build(&place.name, &snapshot)
    }

    /// Check a binding against the mirror
    pub fn resolve_conflicts(&self, bindings: &mut ResourceBindings) -> bool {
        bindings.resolve_conflicts(&self.mirror.borrow())
    }

    /// Power backend of a place this session may use
    pub fn power(&self, place: &str) -> Result<TracedPowerBackend<Box<dyn PowerBackend>>, ClientError> {
        let snapshot = self.mirror.borrow();
        let place = self.accessible(&snapshot, place)?;
        power_backend(place, &snapshot.resources)
    }

    /// Serial console of a place this session may use
    pub fn console(&self, place: &str) -> Result<ConsoleTarget, ClientError> {
        let snapshot = self.mirror.borrow();
        let place = self.accessible(&snapshot, place)?;
        console_target(place, &snapshot.resources)
    }

    /// Wait until the mirror satisfies `predicate`
    pub async fn wait_for<F>(&self, timeout: Duration, mut predicate: F) -> Result<(), ClientError>
    where
        F: FnMut(&Snapshot) -> bool,
    {
        let mut changes = self.mirror.clone();
        let wait = async {
            loop {
                if predicate(&changes.borrow_and_update()) {
                    return Ok(());
                }
                if changes.changed().await.is_err() {
                    return Err(ClientError::Disconnected);
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ClientError::Timeout { request: "wait" })?
    }

    /// Fresh resources straight from the coordinator, bypassing the mirror
    pub async fn fetch_resources(&self) -> Result<ResourceTree, ClientError> {
        match self.conn.call(Request::GetResources).await? {
            Response::Resources { resources } => Ok(resources),
            other => Err(unexpected("get_resources", &other)),
        }
    }

    /// Fresh places straight from the coordinator
    ///
    /// Re-check preconditions with this after a transport error before
    /// retrying a mutation.
    pub async fn fetch_places(&self) -> Result<BTreeMap<String, Place>, ClientError> {
        match self.conn.call(Request::GetPlaces).await? {
            Response::Places { places } => Ok(places),
            other => Err(unexpected("get_places", &other)),
        }
    }

    pub async fn fetch_reservations(&self) -> Result<BTreeMap<String, Reservation>, ClientError> {
        match self.conn.call(Request::GetReservations).await? {
            Response::Reservations { reservations } => Ok(reservations),
            other => Err(unexpected("get_reservations", &other)),
        }
    }

    async fn reservation_call(&self, request: Request) -> Result<Reservation, ClientError> {
        let name = request.name();
        match self.conn.call(request).await? {
            Response::Reservation { reservation } => Ok(reservation),
            other => Err(unexpected(name, &other)),
        }
    }

    fn accessible<'a>(&self, snapshot: &'a Snapshot, place: &str) -> Result<&'a Place, ClientError> {
        let place = snapshot
            .places
            .values()
            .find(|p| p.has_name(place))
            .ok_or_else(|| ClientError::UnknownPlace {
                pattern: place.to_string(),
                candidates: snapshot.places.keys().cloned().collect(),
            })?;
        match &place.acquired {
            None => Err(ClientError::NotAcquired {
                place: place.name.clone(),
            }),
            Some(holder) if !place.has_access(&self.identity) => Err(ClientError::NoAccess {
                place: place.name.clone(),
                holder: holder.clone(),
            }),
            Some(_) => Ok(place),
        }
    }
}

fn unexpected(request: &'static str, response: &Response) -> ClientError {
    ClientError::Unexpected {
        request,
        response: format!("{:?}", response),
    }
}

/// Resolve `pattern` against place names and aliases
///
/// An exact name or alias wins. Otherwise the pattern must be a substring of
/// exactly one place's name or aliases.
pub fn find_place(places: &BTreeMap<String, Place>, pattern: &str) -> Result<Place, ClientError> {
    if let Some(place) = places.values().find(|p| p.has_name(pattern)) {
        return Ok(place.clone());
    }

    let found: Vec<&Place> = places
        .values()
        .filter(|p| p.names().any(|n| n.contains(pattern)))
        .collect();
    match found.as_slice() {
        [place] => Ok((*place).clone()),
        [] => Err(ClientError::UnknownPlace {
            pattern: pattern.to_string(),
            candidates: places.keys().cloned().collect(),
        }),
        many => Err(ClientError::AmbiguousPlace {
            pattern: pattern.to_string(),
            candidates: many.iter().map(|p| p.name.clone()).collect(),
        }),
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
