// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod places;
pub mod reservations;
pub mod resources;
pub mod sync;
pub mod target;

use labgrid_client::{ClientError, ClientSession, OutputFormat};
use lg_core::Place;

/// `-p` value selecting the place allocated to the `LG_TOKEN` reservation
pub const RESERVED_PLACE: &str = "+";

/// What every connected command gets
pub struct Context {
    pub session: ClientSession,
    /// `-p` / `LG_PLACE`, unresolved
    pub place: Option<String>,
    /// `LG_TOKEN`
    pub token: Option<String>,
    pub format: OutputFormat,
}

impl Context {
    /// The place selected with `-p`
    pub fn place(&self) -> Result<Place, ClientError> {
        let pattern = self.place.as_deref().ok_or(ClientError::NoPlace)?;
        if pattern == RESERVED_PLACE {
            return self.reserved_place();
        }
        self.session.find_place(pattern)
    }

    /// The literal `-p` value, for commands that create places
    pub fn place_name(&self) -> Result<&str, ClientError> {
        self.place.as_deref().ok_or(ClientError::NoPlace)
    }

    /// Token given on the command line, else `LG_TOKEN`
    pub fn token<'a>(&'a self, arg: Option<&'a str>) -> Result<&'a str, ClientError> {
        arg.or(self.token.as_deref())
            .ok_or_else(|| ClientError::Invalid("no reservation token given (or LG_TOKEN)".to_string()))
    }

    fn reserved_place(&self) -> Result<Place, ClientError> {
        let token = self.token(None)?;
        let reservations = self.session.reservations();
        let name = reservations
            .get(token)
            .and_then(|r| r.allocated_places().next().map(str::to_string))
            .ok_or_else(|| {
                ClientError::Invalid(format!("reservation {} has no allocated place", token))
            })?;
        self.session.find_place(&name)
    }
}
