// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lg-coordinator: the labgrid coordinator service
//!
//! A single actor owns the registry; every client and exporter connection
//! is a session task that forwards requests to it and relays the ordered
//! change stream back.

pub mod actor;
pub mod broadcast;
pub mod lifecycle;
pub mod protocol;
pub mod server;
pub mod telemetry;

pub use actor::{Caller, CoordinatorActor, CoordinatorError, CoordinatorHandle};
pub use broadcast::{Broadcast, ChangeReceiver, ChangeSender};
pub use lifecycle::{Config, Coordinator, LifecycleError};
pub use protocol::{
    ClientFrame, ProtocolError, Request, Response, Role, ServerFrame, DEFAULT_PORT,
    PROTOCOL_VERSION,
};
pub use telemetry::Telemetry;
