// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Places: named groups of resources acquired as a unit

use crate::clock::Timestamp;
use crate::matcher::ResourceMatch;
use crate::path::ResourcePath;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// An operator-defined place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub matches: Vec<ResourceMatch>,
    #[serde(default)]
    pub acquired: Option<String>,
    #[serde(default)]
    pub acquired_resources: Vec<ResourcePath>,
    #[serde(default)]
    pub allowed: BTreeSet<String>,
    /// Token of the reservation this place is allocated to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation: Option<String>,
    pub created: Timestamp,
    pub changed: Timestamp,
}

impl Place {
    pub fn new(name: impl Into<String>, now: Timestamp) -> Self {
        Self {
            name: name.into(),
            aliases: BTreeSet::new(),
            comment: String::new(),
            tags: BTreeMap::new(),
            matches: Vec::new(),
            acquired: None,
            acquired_resources: Vec::new(),
            allowed: BTreeSet::new(),
            reservation: None,
            created: now,
            changed: now,
        }
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired.is_some()
    }

    pub fn is_acquired_by(&self, identity: &str) -> bool {
        self.acquired.as_deref() == Some(identity)
    }

    /// Whether `identity` may use the place's resources
    pub fn has_access(&self, identity: &str) -> bool {
        self.is_acquired_by(identity) || self.allowed.contains(identity)
    }

    /// Whether `pattern` names this place
    pub fn has_name(&self, pattern: &str) -> bool {
        self.name == pattern || self.aliases.contains(pattern)
    }

    /// Names and aliases, for lookup
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// The match a bound resource was resolved from
    pub fn match_for(&self, path: &ResourcePath) -> Option<&ResourceMatch> {
        self.matches.iter().find(|m| m.ismatch(path))
    }
}
