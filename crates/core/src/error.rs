// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error classification shared by the coordinator and its clients

use serde::{Deserialize, Serialize};

/// How a rejected request should be treated by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The input was wrong; retrying without changing it cannot succeed
    User,
    /// Rejected for a reason the caller could not see at call time
    /// (lost a race, resource gone); re-check the precondition before retrying
    Server,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::User => write!(f, "user error"),
            ErrorKind::Server => write!(f, "server error"),
        }
    }
}
