// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reservations: deferred requests for places matching tag filters

use crate::clock::Timestamp;
use crate::place::Place;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Tag-equality predicates; the key `name` matches the place name
pub type TagFilter = BTreeMap<String, String>;

/// Filter group used when a reservation is created from a single filter
pub const DEFAULT_GROUP: &str = "main";

/// Filter key matched against the place name instead of a tag
pub const NAME_KEY: &str = "name";

/// Reservation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    Waiting,
    Allocated,
    Acquired,
    Expired,
    /// A filter group matches no existing place
    Invalid,
}

impl ReservationState {
    /// Whether the scheduler may still allocate places to this reservation
    pub fn is_pending(self) -> bool {
        matches!(self, ReservationState::Waiting | ReservationState::Invalid)
    }
}

impl std::fmt::Display for ReservationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReservationState::Waiting => "waiting",
            ReservationState::Allocated => "allocated",
            ReservationState::Acquired => "acquired",
            ReservationState::Expired => "expired",
            ReservationState::Invalid => "invalid",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub token: String,
    pub owner: String,
    #[serde(default)]
    pub prio: i64,
    pub filters: BTreeMap<String, TagFilter>,
    #[serde(default)]
    pub allocations: BTreeMap<String, Vec<String>>,
    pub state: ReservationState,
    pub created: Timestamp,
    /// Absolute deadline, extended by polling
    pub timeout: Timestamp,
}

impl Reservation {
    pub fn new(
        token: impl Into<String>,
        owner: impl Into<String>,
        prio: i64,
        filters: BTreeMap<String, TagFilter>,
        now: Timestamp,
        timeout: Timestamp,
    ) -> Self {
        Self {
            token: token.into(),
            owner: owner.into(),
            prio,
            filters,
            allocations: BTreeMap::new(),
            state: ReservationState::Waiting,
            created: now,
            timeout,
        }
    }

    /// Every allocated place name
    pub fn allocated_places(&self) -> impl Iterator<Item = &str> {
        self.allocations.values().flatten().map(String::as_str)
    }
}

/// Check a place against a filter
pub fn filter_matches(filter: &TagFilter, place: &Place) -> bool {
    filter.iter().all(|(key, value)| {
        if key == NAME_KEY {
            place.name == *value
        } else {
            place.tags.get(key) == Some(value)
        }
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("invalid filter term '{0}', expected 'key=value'")]
    Term(String),
    #[error("duplicate filter key '{0}'")]
    Duplicate(String),
}

/// Parse `key=value` terms separated by whitespace
pub fn parse_filter(input: &str) -> Result<TagFilter, FilterError> {
    let mut filter = TagFilter::new();
    for term in input.split_whitespace() {
        let (key, value) = term
            .split_once('=')
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .ok_or_else(|| FilterError::Term(term.to_string()))?;
        if filter.insert(key.to_string(), value.to_string()).is_some() {
            return Err(FilterError::Duplicate(key.to_string()));
        }
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[test]
    fn parse_filter_splits_terms() {
        let filter = parse_filter("board=foo  soc=bar").unwrap();
        assert_eq!(filter.get("board").map(String::as_str), Some("foo"));
        assert_eq!(filter.get("soc").map(String::as_str), Some("bar"));
        assert!(parse_filter("").unwrap().is_empty());
    }

    #[parameterized(
        no_equals = { "board", FilterError::Term("board".into()) },
        empty_key = { "=foo", FilterError::Term("=foo".into()) },
        empty_value = { "board=", FilterError::Term("board=".into()) },
        duplicate = { "a=1 a=2", FilterError::Duplicate("a".into()) },
    )]
    fn parse_filter_rejects(input: &str, expected: FilterError) {
        assert_eq!(parse_filter(input).unwrap_err(), expected);
    }

    #[test]
    fn filter_matches_tags_and_name() {
        let mut place = Place::new("rpi-3", 0.0);
        place.tags.insert("board".into(), "rpi".into());

        assert!(filter_matches(&parse_filter("board=rpi").unwrap(), &place));
        assert!(filter_matches(&parse_filter("name=rpi-3").unwrap(), &place));
        assert!(!filter_matches(&parse_filter("board=rpi name=x").unwrap(), &place));
        assert!(!filter_matches(&parse_filter("soc=am335x").unwrap(), &place));
        assert!(filter_matches(&TagFilter::new(), &place));
    }
}
