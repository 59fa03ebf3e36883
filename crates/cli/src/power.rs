// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Power control of an acquired place

use clap::ValueEnum;
use lg_adapters::{backend_for, PowerBackend, PowerError, TracedPowerBackend};
use lg_core::resource::tree_get;
use lg_core::{Place, ResourceTree};

use crate::error::ClientError;

/// Resource classes that describe a power outlet
pub const POWER_CLASSES: &[&str] = &["NetworkPowerPort", "PowerPort"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PowerAction {
    On,
    Off,
    Cycle,
    Get,
}

impl std::fmt::Display for PowerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PowerAction::On => "on",
            PowerAction::Off => "off",
            PowerAction::Cycle => "cycle",
            PowerAction::Get => "get",
        };
        write!(f, "{}", s)
    }
}

/// Build the backend for the place's bound power resource
pub fn power_backend(
    place: &Place,
    resources: &ResourceTree,
) -> Result<TracedPowerBackend<Box<dyn PowerBackend>>, ClientError> {
    let path = place
        .acquired_resources
        .iter()
        .find(|path| POWER_CLASSES.contains(&path.cls.as_str()))
        .ok_or_else(|| ClientError::MissingResource {
            place: place.name.clone(),
            what: "power",
        })?;
    let entry = tree_get(resources, path)
        .filter(|entry| entry.avail)
        .ok_or_else(|| ClientError::Unavailable(path.clone()))?;

    let params = entry.construction_params();
    let model = params
        .get("model")
        .and_then(|v| v.as_str())
        .ok_or_else(|| PowerError::MissingParam {
            model: entry.cls.clone(),
            param: "model".to_string(),
        })?;
    let backend = backend_for(model, &params)?;
    Ok(TracedPowerBackend::new(backend, path.to_string()))
}

/// Run `action`; `get` reports the outlet state, the others `None`
pub async fn run<P: PowerBackend>(backend: &P, action: PowerAction) -> Result<Option<bool>, ClientError> {
    match action {
        PowerAction::On => backend.on().await?,
        PowerAction::Off => backend.off().await?,
        PowerAction::Cycle => backend.cycle().await?,
        PowerAction::Get => return Ok(Some(backend.get().await?)),
    }
    Ok(None)
}

#[cfg(test)]
#[path = "power_tests.rs"]
mod tests;
