// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource entries published by exporters

use crate::path::ResourcePath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque resource parameters
pub type Params = BTreeMap<String, serde_json::Value>;

/// `exporter -> group -> name -> entry`
pub type ResourceTree = BTreeMap<String, BTreeMap<String, BTreeMap<String, ResourceEntry>>>;

/// Parameter key holding data that is not passed to driver construction
pub const EXTRA_KEY: &str = "extra";

/// A single resource as seen by the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub cls: String,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub avail: bool,
    /// Place currently binding this resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquired: Option<String>,
}

impl ResourceEntry {
    pub fn new(cls: impl Into<String>, params: Params, avail: bool) -> Self {
        Self {
            cls: cls.into(),
            params,
            avail,
            acquired: None,
        }
    }

    /// Parameters used to construct a driver, without the `extra` sub-map
    pub fn construction_params(&self) -> Params {
        self.params
            .iter()
            .filter(|(k, _)| k.as_str() != EXTRA_KEY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// The `extra` sub-map, if any
    pub fn extra(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.params.get(EXTRA_KEY).and_then(|v| v.as_object())
    }
}

/// An exporter's view of one resource, as sent upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUpdate {
    pub path: ResourcePath,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub avail: bool,
}

/// Look up an entry in a resource tree
pub fn tree_get<'a>(tree: &'a ResourceTree, path: &ResourcePath) -> Option<&'a ResourceEntry> {
    tree.get(&path.exporter)?
        .get(&path.group)?
        .get(&path.name)
        .filter(|entry| entry.cls == path.cls)
}

pub fn tree_get_mut<'a>(
    tree: &'a mut ResourceTree,
    path: &ResourcePath,
) -> Option<&'a mut ResourceEntry> {
    tree.get_mut(&path.exporter)?
        .get_mut(&path.group)?
        .get_mut(&path.name)
        .filter(|entry| entry.cls == path.cls)
}

/// Insert or replace an entry, creating intermediate maps
pub fn tree_insert(tree: &mut ResourceTree, path: &ResourcePath, entry: ResourceEntry) {
    tree.entry(path.exporter.clone())
        .or_default()
        .entry(path.group.clone())
        .or_default()
        .insert(path.name.clone(), entry);
}

/// Remove an entry, pruning empty intermediate maps
pub fn tree_remove(tree: &mut ResourceTree, path: &ResourcePath) -> Option<ResourceEntry> {
    let groups = tree.get_mut(&path.exporter)?;
    let names = groups.get_mut(&path.group)?;
    if names.get(&path.name).is_none_or(|e| e.cls != path.cls) {
        return None;
    }
    let removed = names.remove(&path.name);
    if names.is_empty() {
        groups.remove(&path.group);
    }
    if groups.is_empty() {
        tree.remove(&path.exporter);
    }
    removed
}

/// Iterate every resource in a tree with its path
pub fn tree_iter(tree: &ResourceTree) -> impl Iterator<Item = (ResourcePath, &ResourceEntry)> {
    tree.iter().flat_map(|(exporter, groups)| {
        groups.iter().flat_map(move |(group, names)| {
            names.iter().map(move |(name, entry)| {
                let path = ResourcePath::new(
                    exporter.as_str(),
                    group.as_str(),
                    entry.cls.as_str(),
                    name.as_str(),
                );
                (path, entry)
            })
        })
    })
}
