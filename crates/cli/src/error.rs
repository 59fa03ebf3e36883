// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client errors and their user-facing display
//!
//! [`ClientError`] is what the library returns. [`LgError`] wraps one for the
//! terminal with:
//! - What went wrong (message)
//! - Why it might have happened (context)
//! - How to fix it (suggestions)

use std::fmt;

use lg_adapters::PowerError;
use lg_coordinator::ProtocolError;
use lg_core::{ErrorKind, ReservationState, ResourcePath};
use thiserror::Error;

use crate::sync::SyncError;

/// Who has to act for a failed call to succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// The input was wrong
    User,
    /// The coordinator rejected a valid request because of shared state
    Server,
    /// The coordinator could not be reached or stopped answering
    Transport,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::User => write!(f, "user error"),
            Category::Server => write!(f, "server error"),
            Category::Transport => write!(f, "transport error"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot reach coordinator at {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("coordinator did not answer {request} in time")]
    Timeout { request: &'static str },

    #[error("connection to the coordinator was lost")]
    Disconnected,

    #[error("{request} failed: {message}")]
    Rejected {
        request: &'static str,
        kind: ErrorKind,
        message: String,
    },

    #[error("unexpected response to {request}: {response}")]
    Unexpected {
        request: &'static str,
        response: String,
    },

    #[error("no place matches '{pattern}'")]
    UnknownPlace {
        pattern: String,
        candidates: Vec<String>,
    },

    #[error("pattern '{pattern}' matches multiple places")]
    AmbiguousPlace {
        pattern: String,
        candidates: Vec<String>,
    },

    #[error("no place given")]
    NoPlace,

    #[error("place {place} is not acquired")]
    NotAcquired { place: String },

    #[error("place {place} is acquired by {holder}")]
    NoAccess { place: String, holder: String },

    #[error("resource {0} is not available")]
    Unavailable(ResourcePath),

    #[error("place {place} has no {what} resource")]
    MissingResource { place: String, what: &'static str },

    #[error("bindings for place {place} are stale")]
    StaleBinding { place: String },

    #[error("reservation {token} ended as {state}")]
    ReservationEnded {
        token: String,
        state: ReservationState,
    },

    #[error("power: {0}")]
    Power(#[from] PowerError),

    #[error("console at {addr}: {source}")]
    Console {
        addr: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("{0}")]
    Invalid(String),

    #[error("cannot render output: {0}")]
    Render(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Render(e.to_string())
    }
}

impl From<serde_yaml::Error> for ClientError {
    fn from(e: serde_yaml::Error) -> Self {
        ClientError::Render(e.to_string())
    }
}

impl ClientError {
    pub fn category(&self) -> Category {
        match self {
            ClientError::Connect { .. }
            | ClientError::Protocol(_)
            | ClientError::Timeout { .. }
            | ClientError::Disconnected => Category::Transport,
            ClientError::Rejected { kind, .. } => match kind {
                ErrorKind::User => Category::User,
                ErrorKind::Server => Category::Server,
            },
            ClientError::Unexpected { .. }
            | ClientError::Unavailable(_)
            | ClientError::StaleBinding { .. }
            | ClientError::ReservationEnded { .. }
            | ClientError::Console { .. }
            | ClientError::Render(_) => Category::Server,
            ClientError::Power(e) => match e {
                PowerError::CommandFailed(_) => Category::Server,
                _ => Category::User,
            },
            ClientError::UnknownPlace { .. }
            | ClientError::AmbiguousPlace { .. }
            | ClientError::NoPlace
            | ClientError::NotAcquired { .. }
            | ClientError::NoAccess { .. }
            | ClientError::MissingResource { .. }
            | ClientError::Sync(_)
            | ClientError::Invalid(_) => Category::User,
        }
    }
}

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct LgError {
    /// What went wrong
    pub message: String,
    pub category: Category,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
}

impl LgError {
    pub fn new(category: Category, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category,
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Add context about why this error might have happened.
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    /// Add a suggestion for how to fix this error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self.category {
            Category::User => 1,
            Category::Server => 2,
            Category::Transport => 3,
        }
    }
}

impl fmt::Display for LgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for LgError {}

fn candidate_list(candidates: &[String]) -> String {
    if candidates.is_empty() {
        "none".to_string()
    } else {
        candidates.join(", ")
    }
}

impl From<ClientError> for LgError {
    fn from(e: ClientError) -> Self {
        let err = LgError::new(e.category(), e.to_string());
        match e {
            ClientError::Connect { addr, .. } => err
                .with_context("The coordinator may not be running or is unreachable")
                .with_suggestion(format!("Check that labgrid-coordinator listens on {}", addr))
                .with_suggestion("Point at another coordinator with -x HOST:PORT or LG_COORDINATOR"),
            ClientError::Timeout { .. } | ClientError::Disconnected => err
                .with_context("The outcome of a mutating request is unknown")
                .with_suggestion("Re-check the current state: labgrid-client places")
                .with_suggestion("Raise the timeout with LG_TIMEOUT_MS"),
            ClientError::Rejected {
                kind: ErrorKind::Server,
                ..
            } => err
                .with_context("Another session changed the state in the meantime")
                .with_suggestion("Re-check the current state: labgrid-client places"),
            ClientError::UnknownPlace { candidates, .. } => err
                .with_context(format!("known places: {}", candidate_list(&candidates)))
                .with_suggestion("List places: labgrid-client places"),
            ClientError::AmbiguousPlace { candidates, .. } => err
                .with_context(format!("candidates: {}", candidate_list(&candidates)))
                .with_suggestion("Use the full place name or an alias"),
            ClientError::NoPlace => {
                err.with_suggestion("Select a place with -p PLACE or LG_PLACE")
            }
            ClientError::NotAcquired { place } => err
                .with_suggestion(format!("Acquire it first: labgrid-client -p {} acquire", place)),
            ClientError::NoAccess { holder, .. } => err
                .with_context(format!("only {} or allowed users may use it", holder))
                .with_suggestion("Ask the holder to run: labgrid-client allow <you>"),
            ClientError::StaleBinding { .. } => err
                .with_context("The place's resources changed after the binding was built")
                .with_suggestion("Rebuild the binding from the current place state"),
            ClientError::Console { .. } => err
                .with_context("The exporter publishes the port but nothing accepts connections")
                .with_suggestion("Check the serial server on the exporter host"),
            _ => err,
        }
    }
}
