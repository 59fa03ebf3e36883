// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change records and update coalescing
//!
//! This module provides:
//! - `Change` - A committed registry mutation, value or tombstone
//! - `SequencedChange` - A change stamped with its broadcast sequence number
//! - `Coalescer` - Merges same-key updates inside a time window

mod change;
mod coalesce;

pub use change::{Change, SequencedChange, Topic};
pub use coalesce::Coalescer;
