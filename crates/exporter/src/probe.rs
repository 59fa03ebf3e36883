// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource availability probes

use crate::config::ResourceDecl;
use std::path::Path;

/// Decides whether a configured resource is currently usable
pub trait Probe: Send + Sync + 'static {
    fn available(&self, decl: &ResourceDecl) -> bool;
}

/// Probes the local machine
///
/// - `avail = false` always wins
/// - network resources (`Network*` classes) are reachable by definition
/// - a `path` or `match.path` parameter must exist on disk
/// - anything else is available
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceProbe;

impl Probe for DeviceProbe {
    fn available(&self, decl: &ResourceDecl) -> bool {
        if decl.avail == Some(false) {
            return false;
        }
        if decl.path.cls.starts_with("Network") {
            return true;
        }
        let device = decl
            .params
            .get("path")
            .or_else(|| decl.params.get("match").and_then(|m| m.get("path")))
            .and_then(|v| v.as_str());
        match device {
            Some(device) => Path::new(device).exists(),
            None => true,
        }
    }
}
