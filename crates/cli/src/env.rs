// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driver environments for acquired places
//!
//! ```yaml
//! targets:
//!   board-a:
//!     resources:
//!     - NetworkSerialPort:
//!         host: exp1
//!         port: 4000
//!     - NetworkPowerPort:
//!         name: power
//!         model: external
//! ```

use std::collections::BTreeMap;

use lg_core::resource::tree_get;
use lg_core::{Params, Place, ResourcePath, ResourceTree};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::ClientError;

/// Everything needed to construct one driver
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    pub cls: String,
    /// Rename from the place match, if any
    pub name: Option<String>,
    /// Construction parameters (`extra` stripped)
    pub params: Params,
}

impl Serialize for DriverConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut body = self.params.clone();
        if let Some(name) = &self.name {
            body.insert("name".to_string(), serde_json::Value::String(name.clone()));
        }
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.cls, &body)?;
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TargetEnv {
    pub resources: Vec<DriverConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DriverEnv {
    pub targets: BTreeMap<String, TargetEnv>,
}

impl DriverEnv {
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Build the driver environment of an acquired place
///
/// Every bound resource must still be listed and available.
pub fn build_env(place: &Place, resources: &ResourceTree) -> Result<DriverEnv, ClientError> {
    if !place.is_acquired() {
        return Err(ClientError::NotAcquired {
            place: place.name.clone(),
        });
    }

    let mut target = TargetEnv::default();
    for path in &place.acquired_resources {
        target.resources.push(driver_config(place, path, resources)?);
    }

    let mut env = DriverEnv::default();
    env.targets.insert(place.name.clone(), target);
    Ok(env)
}

fn driver_config(
    place: &Place,
    path: &ResourcePath,
    resources: &ResourceTree,
) -> Result<DriverConfig, ClientError> {
    let entry = tree_get(resources, path)
        .filter(|entry| entry.avail)
        .ok_or_else(|| ClientError::Unavailable(path.clone()))?;
    Ok(DriverConfig {
        cls: entry.cls.clone(),
        name: place.match_for(path).and_then(|m| m.rename.clone()),
        params: entry.construction_params(),
    })
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
