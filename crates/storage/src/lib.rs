// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lg-storage: durable place definitions for the coordinator

mod state;
mod wal;

pub use state::{PlaceStore, ReplayReport, StoreError};
pub use wal::{Wal, WalError};
