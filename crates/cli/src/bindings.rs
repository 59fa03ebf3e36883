// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local driver bindings and conflict detection
//!
//! A binding remembers the `acquired_resources` it was built from. Once the
//! mirror disagrees, or a bound resource goes unavailable, the binding is
//! stale and refuses access until it is rebuilt.

use lg_core::resource::tree_get;
use lg_core::{ResourcePath, Snapshot};
use tracing::warn;

use crate::env::{build_env, DriverEnv};
use crate::error::ClientError;

#[derive(Debug, Clone)]
pub struct ResourceBindings {
    place: String,
    built_from: Vec<ResourcePath>,
    env: DriverEnv,
    stale: bool,
}

impl ResourceBindings {
    /// Bind to the current state of `place`
    pub fn build(place: &str, snapshot: &Snapshot) -> Result<Self, ClientError> {
        let (built_from, env) = bind(place, snapshot)?;
        Ok(Self {
            place: place.to_string(),
            built_from,
            env,
            stale: false,
        })
    }

    pub fn place(&self) -> &str {
        &self.place
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Compare against the mirror; returns whether the binding is still valid
    pub fn resolve_conflicts(&mut self, snapshot: &Snapshot) -> bool {
        if self.stale {
            return false;
        }
        let current = snapshot
            .places
            .get(&self.place)
            .map(|p| p.acquired_resources.as_slice())
            .unwrap_or_default();
        let unavailable = self
            .built_from
            .iter()
            .find(|path| !tree_get(&snapshot.resources, path).is_some_and(|e| e.avail));

        if current != self.built_from.as_slice() {
            warn!(place = %self.place, "place resources changed under binding");
            self.stale = true;
        } else if let Some(path) = unavailable {
            warn!(place = %self.place, resource = %path, "bound resource unavailable");
            self.stale = true;
        }
        !self.stale
    }

    /// Driver environment, unless stale
    pub fn env(&self) -> Result<&DriverEnv, ClientError> {
        self.check()?;
        Ok(&self.env)
    }

    /// Bound resources, unless stale
    pub fn resources(&self) -> Result<&[ResourcePath], ClientError> {
        self.check()?;
        Ok(&self.built_from)
    }

    /// Rebind to the current state of the place
    pub fn rebuild(&mut self, snapshot: &Snapshot) -> Result<(), ClientError> {
        let (built_from, env) = bind(&self.place, snapshot)?;
        self.built_from = built_from;
        self.env = env;
        self.stale = false;
        Ok(())
    }

    fn check(&self) -> Result<(), ClientError> {
        if self.stale {
            return Err(ClientError::StaleBinding {
                place: self.place.clone(),
            });
        }
        Ok(())
    }
}

fn bind(place: &str, snapshot: &Snapshot) -> Result<(Vec<ResourcePath>, DriverEnv), ClientError> {
    let place = snapshot
        .places
        .get(place)
        .ok_or_else(|| ClientError::UnknownPlace {
            pattern: place.to_string(),
            candidates: snapshot.places.keys().cloned().collect(),
        })?;
    let env = build_env(place, &snapshot.resources)?;
    Ok((place.acquired_resources.clone(), env))
}

#[cfg(test)]
#[path = "bindings_tests.rs"]
mod tests;
