// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Administrative place operations, as persisted to the write-ahead log

use crate::clock::Timestamp;
use crate::events::Change;
use crate::place::Place;
use crate::registry::{Registry, RegistryError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Place mutations that survive a coordinator restart
///
/// Acquisition and reservations are session state and are not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    AddPlace {
        name: String,
        at: Timestamp,
    },
    DelPlace {
        name: String,
    },
    AddAlias {
        place: String,
        alias: String,
        at: Timestamp,
    },
    DelAlias {
        place: String,
        alias: String,
        at: Timestamp,
    },
    SetComment {
        place: String,
        comment: String,
        at: Timestamp,
    },
    SetTags {
        place: String,
        tags: BTreeMap<String, String>,
        at: Timestamp,
    },
    AddMatch {
        place: String,
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rename: Option<String>,
        at: Timestamp,
    },
    DelMatch {
        place: String,
        pattern: String,
        at: Timestamp,
    },
}

impl Operation {
    /// Apply to a registry through its validated mutations
    pub fn apply(&self, registry: &mut Registry) -> Result<Vec<Change>, RegistryError> {
        match self {
            Operation::AddPlace { name, at } => registry.add_place(name, *at),
            Operation::DelPlace { name } => registry.del_place(name),
            Operation::AddAlias { place, alias, at } => registry.add_alias(place, alias, *at),
            Operation::DelAlias { place, alias, at } => registry.del_alias(place, alias, *at),
            Operation::SetComment { place, comment, at } => {
                registry.set_comment(place, comment, *at)
            }
            Operation::SetTags { place, tags, at } => registry.set_tags(place, tags, *at),
            Operation::AddMatch {
                place,
                pattern,
                rename,
                at,
            } => registry.add_match(place, pattern, rename.clone(), *at),
            Operation::DelMatch { place, pattern, at } => registry.del_match(place, pattern, *at),
        }
    }

    /// Operations that recreate a place's administrative state
    pub fn recreate(place: &Place) -> Vec<Operation> {
        let name = &place.name;
        let at = place.changed;
        let mut ops = vec![Operation::AddPlace {
            name: name.clone(),
            at: place.created,
        }];
        ops.extend(place.aliases.iter().map(|alias| Operation::AddAlias {
            place: name.clone(),
            alias: alias.clone(),
            at,
        }));
        if !place.comment.is_empty() {
            ops.push(Operation::SetComment {
                place: name.clone(),
                comment: place.comment.clone(),
                at,
            });
        }
        if !place.tags.is_empty() {
            ops.push(Operation::SetTags {
                place: name.clone(),
                tags: place.tags.clone(),
                at,
            });
        }
        ops.extend(place.matches.iter().map(|m| Operation::AddMatch {
            place: name.clone(),
            pattern: m.to_string(),
            rename: m.rename.clone(),
            at,
        }));
        ops
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
