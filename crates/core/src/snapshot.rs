// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Point-in-time copies of the registry
//!
//! The coordinator publishes a `Snapshot` after every commit; clients install
//! one on join and keep it current by applying sequenced changes.

use crate::events::{Change, SequencedChange};
use crate::place::Place;
use crate::reservation::Reservation;
use crate::resource::{tree_insert, tree_remove, ResourceTree};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Sequence number of the last change reflected here
    pub seq: u64,
    #[serde(default)]
    pub resources: ResourceTree,
    #[serde(default)]
    pub places: BTreeMap<String, Place>,
    #[serde(default)]
    pub reservations: BTreeMap<String, Reservation>,
}

impl Snapshot {
    /// Apply a change if it is newer than this snapshot
    ///
    /// Returns `false` for changes already reflected, so replays are harmless.
    pub fn apply(&mut self, change: &SequencedChange) -> bool {
        if change.seq <= self.seq {
            return false;
        }
        self.apply_change(&change.change);
        self.seq = change.seq;
        true
    }

    /// Apply a change unconditionally (last write wins per key)
    pub fn apply_change(&mut self, change: &Change) {
        match change {
            Change::ResourceChanged { path, resource } => match resource {
                Some(entry) => {
                    // A class change under the same name replaces the old entry
                    tree_insert(&mut self.resources, path, entry.clone())
                }
                None => {
                    tree_remove(&mut self.resources, path);
                }
            },
            Change::PlaceChanged { name, place } => match place {
                Some(place) => {
                    self.places.insert(name.clone(), place.clone());
                }
                None => {
                    self.places.remove(name);
                }
            },
            Change::ReservationChanged { token, reservation } => match reservation {
                Some(reservation) => {
                    self.reservations.insert(token.clone(), reservation.clone());
                }
                None => {
                    self.reservations.remove(token);
                }
            },
        }
    }
}
