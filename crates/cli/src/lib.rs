// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! labgrid-client: sessions against a labgrid coordinator
//!
//! A [`ClientSession`] keeps a mirror of the coordinator's resources, places
//! and reservations current, resolves places, drives mutations and builds
//! driver environments for acquired places.

pub mod bindings;
pub mod connection;
pub mod console;
pub mod env;
pub mod error;
pub mod output;
pub mod power;
pub mod session;
pub mod sync;

pub use bindings::ResourceBindings;
pub use connection::Connection;
pub use console::{attach, console_target, ConsoleTarget};
pub use env::{build_env, DriverConfig, DriverEnv, TargetEnv};
pub use error::{Category, ClientError, LgError};
pub use output::OutputFormat;
pub use power::PowerAction;
pub use session::{default_identity, find_place, ClientSession, SessionOptions, DEFAULT_COORDINATOR};
pub use sync::{plan, PlacesDocument, SyncAction, SyncError};
