// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hierarchical glob matching of resource paths
//!
//! A match is written `exporter/group/cls[/name]`. Each field is an
//! fnmatch-style glob (`*`, `?`, `[...]`), matched case-sensitively against
//! the corresponding field of a [`ResourcePath`].

use crate::path::ResourcePath;
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Format hint included in parse errors
pub const MATCH_FORMAT: &str = "exporter/group/cls[/name]";

/// Errors from parsing a match pattern
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("invalid match pattern '{pattern}', expected '{MATCH_FORMAT}'")]
    Format { pattern: String },
    #[error("invalid glob '{glob}' in match pattern '{pattern}': {reason}")]
    Glob {
        pattern: String,
        glob: String,
        reason: String,
    },
}

/// Match a single field against a glob
///
/// An invalid glob matches nothing.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    Pattern::new(pattern)
        .map(|p| p.matches_with(text, GLOB_OPTIONS))
        .unwrap_or(false)
}

/// A place-scoped selector for resources
///
/// Equality and hashing ignore `rename`, so a match can be located and
/// removed by its pattern alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceMatch {
    pub exporter: String,
    pub group: String,
    pub cls: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
}

impl ResourceMatch {
    /// Attach a cosmetic rename for the bound resource
    pub fn with_rename(mut self, rename: Option<String>) -> Self {
        self.rename = rename;
        self
    }

    /// Check whether this match selects the given resource
    pub fn ismatch(&self, path: &ResourcePath) -> bool {
        glob_match(&self.exporter, &path.exporter)
            && glob_match(&self.group, &path.group)
            && glob_match(&self.cls, &path.cls)
            && self
                .name
                .as_deref()
                .is_none_or(|name| glob_match(name, &path.name))
    }

    /// Pattern plus rename, for listings
    pub fn describe(&self) -> String {
        match &self.rename {
            Some(rename) => format!("{} -> {}", self, rename),
            None => self.to_string(),
        }
    }

    fn fields(&self) -> (&str, &str, &str, Option<&str>) {
        (&self.exporter, &self.group, &self.cls, self.name.as_deref())
    }
}

impl FromStr for ResourceMatch {
    type Err = MatchError;

    fn from_str(pattern: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = pattern.split('/').collect();
        if !(3..=4).contains(&parts.len()) || parts.iter().any(|p| p.is_empty()) {
            return Err(MatchError::Format {
                pattern: pattern.to_string(),
            });
        }

        for part in &parts {
            Pattern::new(part).map_err(|e| MatchError::Glob {
                pattern: pattern.to_string(),
                glob: part.to_string(),
                reason: e.msg.to_string(),
            })?;
        }

        Ok(Self {
            exporter: parts[0].to_string(),
            group: parts[1].to_string(),
            cls: parts[2].to_string(),
            name: parts.get(3).map(|s| s.to_string()),
            rename: None,
        })
    }
}

impl std::fmt::Display for ResourceMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.exporter, self.group, self.cls)?;
        if let Some(name) = &self.name {
            write!(f, "/{}", name)?;
        }
        Ok(())
    }
}

impl PartialEq for ResourceMatch {
    fn eq(&self, other: &Self) -> bool {
        self.fields() == other.fields()
    }
}

impl Eq for ResourceMatch {}

impl Hash for ResourceMatch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fields().hash(state);
    }
}

#[cfg(test)]
#[path = "matcher_tests.rs"]
mod tests;
