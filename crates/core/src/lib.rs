// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lg-core: the pure model behind the labgrid coordinator
//!
//! This crate provides:
//! - The hierarchical glob matcher binding places to resources
//! - The registry of resources, places and reservations with validated mutations
//! - The reservation scheduler
//! - Change records, snapshots and event coalescing
//! - Persistable place operations
//!
//! Nothing in here performs I/O; the coordinator owns the single writer.

pub mod clock;
pub mod error;
pub mod events;
pub mod id;
pub mod matcher;
pub mod operation;
pub mod path;
pub mod place;
pub mod registry;
pub mod reservation;
pub mod resource;
pub mod scheduler;
pub mod snapshot;

pub use clock::{Clock, FakeClock, SystemClock, Timestamp};
pub use error::ErrorKind;
pub use events::{Change, Coalescer, SequencedChange, Topic};
pub use id::{IdGen, SequentialIdGen, TokenIdGen};
pub use matcher::{glob_match, MatchError, ResourceMatch};
pub use operation::Operation;
pub use path::ResourcePath;
pub use place::Place;
pub use registry::{Registry, RegistryConfig, RegistryError};
pub use reservation::{
    filter_matches, parse_filter, FilterError, Reservation, ReservationState, TagFilter,
};
pub use resource::{Params, ResourceEntry, ResourceTree, ResourceUpdate};
pub use scheduler::{schedule, SchedulerConfig};
pub use snapshot::Snapshot;
