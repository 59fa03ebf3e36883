// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exporter configuration
//!
//! ```toml
//! name = "exp1"
//! coordinator = "coordinator.lab:20408"
//!
//! [group.board]
//! NetworkSerialPort = { host = "exp1", port = 4000 }
//! USBSerialPort = [
//!     { name = "console", path = "/dev/ttyUSB0" },
//!     { name = "debug", match = { path = "/dev/ttyUSB1" } },
//! ]
//! ```
//!
//! Each entry under `[group.<name>]` is a resource class with one table or
//! an array of tables. `name` defaults to the class; `avail = false` keeps a
//! resource unavailable. Every other key is a resource parameter.

use lg_core::{Params, ResourcePath};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Parameter keys consumed by the exporter itself
const NAME_KEY: &str = "name";
const AVAIL_KEY: &str = "avail";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid exporter config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("resource name {name} is declared twice in group {group}")]
    Duplicate { group: String, name: String },
    #[error("invalid resource {resource}: {reason}")]
    Invalid { resource: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum Entries {
    One(Params),
    Many(Vec<Params>),
}

impl Entries {
    fn iter(&self) -> impl Iterator<Item = &Params> {
        match self {
            Entries::One(params) => std::slice::from_ref(params).iter(),
            Entries::Many(list) => list.iter(),
        }
    }
}

fn default_coordinator() -> String {
    format!("127.0.0.1:{}", lg_coordinator::DEFAULT_PORT)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_coalesce_window() -> Duration {
    Duration::from_millis(500)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    /// Exporter name; the first element of every resource path
    pub name: String,
    /// `host:port` of the coordinator
    #[serde(default = "default_coordinator")]
    pub coordinator: String,
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(default = "default_heartbeat_interval", with = "humantime_serde")]
    pub heartbeat_interval: Duration,
    /// How long availability changes are merged before publishing
    #[serde(default = "default_coalesce_window", with = "humantime_serde")]
    pub coalesce_window: Duration,
    #[serde(default)]
    group: BTreeMap<String, BTreeMap<String, Entries>>,
}

/// One configured resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDecl {
    pub path: ResourcePath,
    pub params: Params,
    /// Explicit `avail` setting, if any
    pub avail: Option<bool>,
}

impl ExporterConfig {
    /// Read and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.resources()?;
        Ok(config)
    }

    /// Flatten the group tables into resource declarations
    pub fn resources(&self) -> Result<Vec<ResourceDecl>, ConfigError> {
        check_name("exporter", &self.name)?;
        let mut seen = BTreeSet::new();
        let mut decls = Vec::new();

        for (group, classes) in &self.group {
            check_name("group", group)?;
            for (cls, entries) in classes {
                check_name("class", cls)?;
                for entry in entries.iter() {
                    let decl = self.declare(group, cls, entry)?;
                    // Resources are keyed by group and name, whatever the class
                    if !seen.insert((group.as_str(), decl.path.name.clone())) {
                        return Err(ConfigError::Duplicate {
                            group: group.clone(),
                            name: decl.path.name,
                        });
                    }
                    decls.push(decl);
                }
            }
        }
        Ok(decls)
    }

    fn declare(&self, group: &str, cls: &str, entry: &Params) -> Result<ResourceDecl, ConfigError> {
        let mut params = entry.clone();
        let invalid = |reason: &str| ConfigError::Invalid {
            resource: format!("{}/{}/{}", self.name, group, cls),
            reason: reason.to_string(),
        };

        let name = match params.remove(NAME_KEY) {
            None => cls.to_string(),
            Some(value) => value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid("name must be a string"))?,
        };
        check_name("resource", &name)?;
        let avail = match params.remove(AVAIL_KEY) {
            None => None,
            Some(value) => Some(
                value
                    .as_bool()
                    .ok_or_else(|| invalid("avail must be true or false"))?,
            ),
        };

        Ok(ResourceDecl {
            path: ResourcePath::new(&self.name, group, cls, name),
            params,
            avail,
        })
    }
}

fn check_name(what: &str, name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name.contains('/') || name.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid {
            resource: name.to_string(),
            reason: format!("{} names must be non-empty without '/' or spaces", what),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
