// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change records produced by registry mutations

use crate::path::ResourcePath;
use crate::place::Place;
use crate::reservation::Reservation;
use crate::resource::ResourceEntry;
use serde::{Deserialize, Serialize};

/// Broadcast topic a change belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    ResourceChanged,
    PlaceChanged,
    ReservationChanged,
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Topic::ResourceChanged => "resource_changed",
            Topic::PlaceChanged => "place_changed",
            Topic::ReservationChanged => "reservation_changed",
        };
        write!(f, "{}", s)
    }
}

/// A key plus its new value, or `None` as a tombstone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", rename_all = "snake_case")]
pub enum Change {
    ResourceChanged {
        path: ResourcePath,
        resource: Option<ResourceEntry>,
    },
    PlaceChanged {
        name: String,
        place: Option<Place>,
    },
    ReservationChanged {
        token: String,
        reservation: Option<Reservation>,
    },
}

impl Change {
    pub fn topic(&self) -> Topic {
        match self {
            Change::ResourceChanged { .. } => Topic::ResourceChanged,
            Change::PlaceChanged { .. } => Topic::PlaceChanged,
            Change::ReservationChanged { .. } => Topic::ReservationChanged,
        }
    }

    /// Human-readable key, for logging
    pub fn key(&self) -> String {
        match self {
            Change::ResourceChanged { path, .. } => path.to_string(),
            Change::PlaceChanged { name, .. } => name.clone(),
            Change::ReservationChanged { token, .. } => token.clone(),
        }
    }

    pub fn is_tombstone(&self) -> bool {
        match self {
            Change::ResourceChanged { resource, .. } => resource.is_none(),
            Change::PlaceChanged { place, .. } => place.is_none(),
            Change::ReservationChanged { reservation, .. } => reservation.is_none(),
        }
    }
}

/// A change stamped with the broadcast sequence it was committed at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedChange {
    pub seq: u64,
    #[serde(flatten)]
    pub change: Change,
}
