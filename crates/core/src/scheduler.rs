// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reservation scheduling
//!
//! `schedule` is a pure pass over the registry: the coordinator runs it on a
//! periodic tick and after mutations that can unblock a reservation. Passes
//! are idempotent; running one twice at the same instant changes nothing the
//! second time.

use crate::clock::Timestamp;
use crate::events::Change;
use crate::registry::{place_change, reservation_change, Registry};
use crate::reservation::{filter_matches, Reservation, ReservationState};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How long a reservation lives without being polled
    #[serde(with = "humantime_serde")]
    pub reservation_timeout: Duration,
    /// How long expired reservations stay visible before removal
    #[serde(with = "humantime_serde")]
    pub expired_retention: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            reservation_timeout: Duration::from_secs(60),
            expired_retention: Duration::from_secs(60),
        }
    }
}

impl SchedulerConfig {
    /// Deadline for a reservation created or polled at `now`
    pub fn deadline(&self, now: Timestamp) -> Timestamp {
        now + self.reservation_timeout.as_secs_f64()
    }
}

/// Run one scheduling pass, returning the changes it committed
pub fn schedule(registry: &mut Registry, now: Timestamp, config: &SchedulerConfig) -> Vec<Change> {
    let mut changes = Vec::new();
    expire(registry, now, &mut changes);
    complete(registry, now, &mut changes);
    mark_acquired(registry, &mut changes);
    allocate(registry, &mut changes);
    collect_garbage(registry, now, config, &mut changes);
    changes
}

fn expire(registry: &mut Registry, now: Timestamp, changes: &mut Vec<Change>) {
    let due: Vec<Reservation> = registry
        .reservations
        .values()
        .filter(|r| {
            !matches!(
                r.state,
                ReservationState::Acquired | ReservationState::Expired
            ) && now > r.timeout
        })
        .cloned()
        .collect();
    for reservation in due {
        tracing::info!(token = %reservation.token, owner = %reservation.owner, "reservation expired");
        let deadline = reservation.timeout;
        set_expired(registry, reservation, deadline, changes);
    }
}

fn complete(registry: &mut Registry, now: Timestamp, changes: &mut Vec<Change>) {
    let done: Vec<Reservation> = registry
        .reservations
        .values()
        .filter(|r| r.state == ReservationState::Acquired)
        .filter(|r| {
            !r.allocated_places().all(|name| {
                registry
                    .places
                    .get(name)
                    .is_some_and(|p| p.is_acquired_by(&r.owner))
            })
        })
        .cloned()
        .collect();
    for reservation in done {
        tracing::info!(token = %reservation.token, "reservation completed");
        // Retention counts from completion, not from the stale deadline
        set_expired(registry, reservation, now, changes);
    }
}

fn set_expired(
    registry: &mut Registry,
    reservation: Reservation,
    timeout: Timestamp,
    changes: &mut Vec<Change>,
) {
    changes.extend(registry.clear_allocations(&reservation));
    if let Some(r) = registry.reservations.get_mut(&reservation.token) {
        r.state = ReservationState::Expired;
        r.allocations.clear();
        r.timeout = timeout;
        changes.push(reservation_change(r));
    }
}

fn mark_acquired(registry: &mut Registry, changes: &mut Vec<Change>) {
    let ready: Vec<String> = registry
        .reservations
        .values()
        .filter(|r| r.state == ReservationState::Allocated)
        .filter(|r| {
            r.allocated_places().all(|name| {
                registry
                    .places
                    .get(name)
                    .is_some_and(|p| p.is_acquired_by(&r.owner))
            })
        })
        .map(|r| r.token.clone())
        .collect();
    for token in ready {
        if let Some(r) = registry.reservations.get_mut(&token) {
            tracing::info!(token = %r.token, "reservation acquired");
            r.state = ReservationState::Acquired;
            changes.push(reservation_change(r));
        }
    }
}

enum Outcome {
    Allocated(BTreeMap<String, Vec<String>>),
    Blocked,
    Invalid,
}

fn allocate(registry: &mut Registry, changes: &mut Vec<Change>) {
    let mut pending: Vec<&Reservation> = registry
        .reservations
        .values()
        .filter(|r| r.state.is_pending())
        .collect();
    // Highest priority first, then oldest, so nothing starves behind newcomers
    pending.sort_by(|a, b| {
        b.prio
            .cmp(&a.prio)
            .then(a.created.total_cmp(&b.created))
            .then(a.token.cmp(&b.token))
    });
    let pending: Vec<Reservation> = pending.into_iter().cloned().collect();

    for reservation in pending {
        let (state, allocations) = match try_allocate(registry, &reservation) {
            Outcome::Allocated(allocations) => (ReservationState::Allocated, allocations),
            Outcome::Blocked => (ReservationState::Waiting, BTreeMap::new()),
            Outcome::Invalid => (ReservationState::Invalid, BTreeMap::new()),
        };
        if state == reservation.state {
            continue;
        }

        for name in allocations.values().flatten() {
            if let Some(place) = registry.places.get_mut(name) {
                place.reservation = Some(reservation.token.clone());
                changes.push(place_change(place));
            }
        }
        if let Some(r) = registry.reservations.get_mut(&reservation.token) {
            tracing::info!(token = %r.token, state = %state, "reservation updated");
            r.state = state;
            r.allocations = allocations;
            changes.push(reservation_change(r));
        }
    }
}

/// Pick one place per filter group; every group or none
fn try_allocate(registry: &Registry, reservation: &Reservation) -> Outcome {
    let mut chosen: BTreeSet<&str> = BTreeSet::new();
    let mut allocations = BTreeMap::new();
    let mut blocked = false;

    for (group, filter) in &reservation.filters {
        let mut matching = registry
            .places
            .values()
            .filter(|p| filter_matches(filter, p))
            .peekable();
        if matching.peek().is_none() {
            return Outcome::Invalid;
        }
        let free = matching.find(|p| {
            p.reservation.is_none()
                && p.acquired
                    .as_deref()
                    .is_none_or(|owner| owner == reservation.owner)
                && !chosen.contains(p.name.as_str())
        });
        match free {
            Some(place) => {
                chosen.insert(place.name.as_str());
                allocations.insert(group.clone(), vec![place.name.clone()]);
            }
            // Keep checking later groups so an invalid one is still reported
            None => blocked = true,
        }
    }

    if blocked {
        Outcome::Blocked
    } else {
        Outcome::Allocated(allocations)
    }
}

fn collect_garbage(
    registry: &mut Registry,
    now: Timestamp,
    config: &SchedulerConfig,
    changes: &mut Vec<Change>,
) {
    let retention = config.expired_retention.as_secs_f64();
    let stale: Vec<String> = registry
        .reservations
        .values()
        .filter(|r| r.state == ReservationState::Expired && now > r.timeout + retention)
        .map(|r| r.token.clone())
        .collect();
    for token in stale {
        registry.reservations.remove(&token);
        changes.push(Change::ReservationChanged {
            token,
            reservation: None,
        });
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
