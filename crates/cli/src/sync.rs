// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative place reconciliation
//!
//! ```toml
//! [places.board-a]
//! comment = "rack 3"
//! aliases = ["a"]
//! matches = ["exp1/board-a/*", "exp1/power/NetworkPowerPort/3 -> power"]
//! tags = { board = "rpi4" }
//! ```
//!
//! [`plan`] compares the document with the coordinator's places and returns
//! only the calls needed to converge, so a converged target plans nothing.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use lg_coordinator::Request;
use lg_core::{MatchError, Place, ResourceMatch};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::error::ClientError;
use crate::session::ClientSession;

/// Separator between a match pattern and its rename
const RENAME_SEPARATOR: &str = " -> ";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid places file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("place {place}: {source}")]
    Match { place: String, source: MatchError },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaceSpec {
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    /// `exporter/group/cls[/name]`, optionally followed by ` -> rename`
    #[serde(default)]
    pub matches: Vec<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlacesDocument {
    #[serde(default)]
    pub places: BTreeMap<String, PlaceSpec>,
}

impl PlacesDocument {
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let text = std::fs::read_to_string(path).map_err(|source| SyncError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, SyncError> {
        Ok(toml::from_str(text)?)
    }
}

/// One mutating call against the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    DelPlace {
        place: String,
    },
    AddPlace {
        place: String,
    },
    DelAlias {
        place: String,
        alias: String,
    },
    AddAlias {
        place: String,
        alias: String,
    },
    SetComment {
        place: String,
        comment: String,
    },
    DelMatch {
        place: String,
        pattern: String,
    },
    AddMatch {
        place: String,
        pattern: String,
        rename: Option<String>,
    },
    /// Tags to set; an empty value removes the tag
    SetTags {
        place: String,
        tags: BTreeMap<String, String>,
    },
}

impl SyncAction {
    pub fn into_request(self) -> Request {
        match self {
            SyncAction::DelPlace { place } => Request::DelPlace { name: place },
            SyncAction::AddPlace { place } => Request::AddPlace { name: place },
            SyncAction::DelAlias { place, alias } => Request::DelPlaceAlias { place, alias },
            SyncAction::AddAlias { place, alias } => Request::AddPlaceAlias { place, alias },
            SyncAction::SetComment { place, comment } => Request::SetPlaceComment { place, comment },
            SyncAction::DelMatch { place, pattern } => Request::DelPlaceMatch { place, pattern },
            SyncAction::AddMatch {
                place,
                pattern,
                rename,
            } => Request::AddPlaceMatch {
                place,
                pattern,
                rename,
            },
            SyncAction::SetTags { place, tags } => Request::SetPlaceTags { place, tags },
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::DelPlace { place } => write!(f, "del-place {}", place),
            SyncAction::AddPlace { place } => write!(f, "add-place {}", place),
            SyncAction::DelAlias { place, alias } => write!(f, "{}: del-alias {}", place, alias),
            SyncAction::AddAlias { place, alias } => write!(f, "{}: add-alias {}", place, alias),
            SyncAction::SetComment { place, comment } => {
                write!(f, "{}: set-comment {:?}", place, comment)
            }
            SyncAction::DelMatch { place, pattern } => write!(f, "{}: del-match {}", place, pattern),
            SyncAction::AddMatch {
                place,
                pattern,
                rename,
            } => match rename {
                Some(rename) => write!(f, "{}: add-match {} -> {}", place, pattern, rename),
                None => write!(f, "{}: add-match {}", place, pattern),
            },
            SyncAction::SetTags { place, tags } => {
                let tags: Vec<String> = tags.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                write!(f, "{}: set-tags {}", place, tags.join(" "))
            }
        }
    }
}

/// Parse a document match entry into a match with its rename
pub fn parse_match(entry: &str) -> Result<ResourceMatch, MatchError> {
    let (pattern, rename) = match entry.split_once(RENAME_SEPARATOR) {
        Some((pattern, rename)) => (pattern.trim(), Some(rename.trim().to_string())),
        None => (entry.trim(), None),
    };
    Ok(pattern.parse::<ResourceMatch>()?.with_rename(rename))
}

/// The calls that turn `current` into `desired`
///
/// Deletions of undeclared places (`prune`) come first so their names and
/// aliases are free for the rest of the plan.
pub fn plan(
    current: &BTreeMap<String, Place>,
    desired: &PlacesDocument,
    prune: bool,
) -> Result<Vec<SyncAction>, SyncError> {
    let mut actions = Vec::new();

    if prune {
        for name in current.keys().filter(|n| !desired.places.contains_key(*n)) {
            actions.push(SyncAction::DelPlace {
                place: name.clone(),
            });
        }
    }

    for (name, spec) in &desired.places {
        let matches = spec
            .matches
            .iter()
            .map(String::as_str)
            .map(parse_match)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| SyncError::Match {
                place: name.clone(),
                source,
            })?;
        let empty;
        let place = match current.get(name) {
            Some(place) => place,
            None => {
                actions.push(SyncAction::AddPlace {
                    place: name.clone(),
                });
                empty = Place::new(name.clone(), 0.0);
                &empty
            }
        };
        plan_place(place, spec, &matches, &mut actions);
    }
    Ok(actions)
}

fn plan_place(place: &Place, spec: &PlaceSpec, matches: &[ResourceMatch], actions: &mut Vec<SyncAction>) {
    let name = &place.name;

    for alias in place.aliases.difference(&spec.aliases) {
        actions.push(SyncAction::DelAlias {
            place: name.clone(),
            alias: alias.clone(),
        });
    }
    for alias in spec.aliases.difference(&place.aliases) {
        actions.push(SyncAction::AddAlias {
            place: name.clone(),
            alias: alias.clone(),
        });
    }

    if place.comment != spec.comment {
        actions.push(SyncAction::SetComment {
            place: name.clone(),
            comment: spec.comment.clone(),
        });
    }

    // A changed rename is a different match as far as the document goes
    let same = |a: &ResourceMatch, b: &ResourceMatch| a == b && a.rename == b.rename;
    for existing in &place.matches {
        if !matches.iter().any(|m| same(m, existing)) {
            actions.push(SyncAction::DelMatch {
                place: name.clone(),
                pattern: existing.to_string(),
            });
        }
    }
    for wanted in matches {
        if !place.matches.iter().any(|m| same(m, wanted)) {
            actions.push(SyncAction::AddMatch {
                place: name.clone(),
                pattern: wanted.to_string(),
                rename: wanted.rename.clone(),
            });
        }
    }

    let mut tags = BTreeMap::new();
    for key in place.tags.keys().filter(|k| !spec.tags.contains_key(*k)) {
        tags.insert(key.clone(), String::new());
    }
    for (key, value) in &spec.tags {
        if place.tags.get(key) != Some(value) {
            tags.insert(key.clone(), value.clone());
        }
    }
    if !tags.is_empty() {
        actions.push(SyncAction::SetTags {
            place: name.clone(),
            tags,
        });
    }
}

/// Issue `actions` in order, stopping at the first rejection
///
/// Returns how many calls succeeded.
pub async fn apply(session: &ClientSession, actions: Vec<SyncAction>) -> Result<usize, ClientError> {
    let mut done = 0;
    for action in actions {
        info!(%action, "applying");
        session.execute(action.into_request()).await?;
        done += 1;
    }
    Ok(done)
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
