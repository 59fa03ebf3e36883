// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The registry of resources, places and reservations
//!
//! Every mutation validates its preconditions before touching state, so a
//! failed call leaves the registry exactly as it was. Successful mutations
//! return the [`Change`] records to broadcast, in commit order.

use crate::clock::Timestamp;
use crate::error::ErrorKind;
use crate::events::Change;
use crate::matcher::{MatchError, ResourceMatch};
use crate::path::ResourcePath;
use crate::place::Place;
use crate::reservation::{Reservation, ReservationState, TagFilter};
use crate::resource::{
    tree_get, tree_get_mut, tree_insert, tree_iter, tree_remove, ResourceEntry, ResourceTree,
    ResourceUpdate,
};
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

/// Policy knobs for registry mutations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Permit `set_tags` on an acquired place
    pub allow_tags_while_acquired: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("place '{0}' not found")]
    UnknownPlace(String),
    #[error("'{0}' is already used as a place name or alias")]
    NameTaken(String),
    #[error("invalid name '{0}'")]
    InvalidName(String),
    #[error("place '{0}' has no alias '{1}'")]
    UnknownAlias(String, String),
    #[error("place {place} is already acquired by {owner}")]
    AlreadyAcquired { place: String, owner: String },
    #[error("place {0} is not acquired")]
    NotAcquired(String),
    #[error("place {place} is acquired by {owner}, not by you")]
    NotOwner { place: String, owner: String },
    #[error("place {0} is acquired; release it first")]
    PlaceAcquired(String),
    #[error("place {place} is allocated to reservation {token}")]
    PlaceReserved { place: String, token: String },
    #[error(transparent)]
    InvalidMatch(#[from] MatchError),
    #[error("place {place} already has match '{pattern}'")]
    DuplicateMatch { place: String, pattern: String },
    #[error("no such match '{pattern}' on place {place}")]
    NoSuchMatch { place: String, pattern: String },
    #[error("invalid tag '{key}={value}'")]
    InvalidTag { key: String, value: String },
    #[error("no available resource for match '{pattern}' of place {place}")]
    NoResource { place: String, pattern: String },
    #[error("resources for match '{pattern}' of place {place} are in use by place {holder}")]
    ResourceBound {
        place: String,
        pattern: String,
        holder: String,
    },
    #[error("match '{pattern}' of place {place} is ambiguous: {candidates} resources match")]
    AmbiguousMatch {
        place: String,
        pattern: String,
        candidates: usize,
    },
    #[error("invalid resource path '{0}'")]
    InvalidResource(ResourcePath),
    #[error("exporter '{0}' is already connected")]
    ExporterExists(String),
    #[error("reservation {0} not found")]
    UnknownReservation(String),
    #[error("reservation {0} already exists")]
    ReservationExists(String),
    #[error("reservation {token} belongs to {owner}")]
    NotReservationOwner { token: String, owner: String },
    #[error("invalid reservation filter: {0}")]
    InvalidFilter(String),
}

impl RegistryError {
    /// Whether the caller could have avoided this error by changing its input
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::NoResource { .. }
            | RegistryError::ResourceBound { .. }
            | RegistryError::PlaceReserved { .. } => ErrorKind::Server,
            _ => ErrorKind::User,
        }
    }
}

type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Clone, Default)]
pub struct Registry {
    config: RegistryConfig,
    pub(crate) resources: ResourceTree,
    pub(crate) places: BTreeMap<String, Place>,
    aliases: HashMap<String, String>,
    pub(crate) reservations: BTreeMap<String, Reservation>,
    online: BTreeSet<String>,
    /// Exporter updates to bound resources, applied when the binding ends.
    /// `None` means the exporter no longer publishes the resource.
    deferred: BTreeMap<ResourcePath, Option<ResourceUpdate>>,
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // -- queries --

    pub fn place(&self, name: &str) -> Option<&Place> {
        self.places.get(name)
    }

    pub fn place_by_alias(&self, alias: &str) -> Option<&Place> {
        self.aliases.get(alias).and_then(|name| self.places.get(name))
    }

    /// Resolve an exact place name or alias to the canonical name
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.places
            .get_key_value(name)
            .map(|(k, _)| k.as_str())
            .or_else(|| self.aliases.get(name).map(String::as_str))
    }

    pub fn places(&self) -> &BTreeMap<String, Place> {
        &self.places
    }

    pub fn resource(&self, path: &ResourcePath) -> Option<&ResourceEntry> {
        tree_get(&self.resources, path)
    }

    pub fn resources(&self) -> &ResourceTree {
        &self.resources
    }

    pub fn reservation(&self, token: &str) -> Option<&Reservation> {
        self.reservations.get(token)
    }

    pub fn reservations(&self) -> &BTreeMap<String, Reservation> {
        &self.reservations
    }

    /// The place currently binding a resource
    pub fn binding_place(&self, path: &ResourcePath) -> Option<&str> {
        self.resource(path).and_then(|e| e.acquired.as_deref())
    }

    pub fn is_online(&self, exporter: &str) -> bool {
        self.online.contains(exporter)
    }

    /// Copy the current state, stamped with `seq`
    pub fn snapshot(&self, seq: u64) -> Snapshot {
        Snapshot {
            seq,
            resources: self.resources.clone(),
            places: self.places.clone(),
            reservations: self.reservations.clone(),
        }
    }

    // -- exporter side --

    /// Mark an exporter as connected
    pub fn register_exporter(&mut self, exporter: &str) -> Result<()> {
        validate_name(exporter)?;
        if !self.online.insert(exporter.to_string()) {
            return Err(RegistryError::ExporterExists(exporter.to_string()));
        }
        Ok(())
    }

    pub fn upsert_resource(&mut self, update: ResourceUpdate) -> Result<Vec<Change>> {
        let ResourceUpdate {
            path,
            params,
            avail,
        } = update;
        if path.exporter.is_empty() || path.group.is_empty() || path.cls.is_empty() {
            return Err(RegistryError::InvalidResource(path));
        }

        let mut changes = Vec::new();
        let existing = self
            .resources
            .get(&path.exporter)
            .and_then(|g| g.get(&path.group))
            .and_then(|n| n.get(&path.name));

        let acquired = match existing {
            Some(entry) if entry.cls == path.cls => {
                let acquired = entry.acquired.clone();
                let unchanged = entry.params == params && entry.avail == avail;
                self.deferred.remove(&path);
                if unchanged {
                    return Ok(changes);
                }
                acquired
            }
            Some(entry) => {
                // Same name, new class: the old resource goes away
                let old = ResourcePath::new(&path.exporter, &path.group, &entry.cls, &path.name);
                if entry.acquired.is_some() {
                    changes.extend(self.mark_unavailable(&old));
                    self.deferred.insert(
                        old,
                        Some(ResourceUpdate {
                            path,
                            params,
                            avail,
                        }),
                    );
                    return Ok(changes);
                }
                tree_remove(&mut self.resources, &old);
                changes.push(Change::ResourceChanged {
                    path: old,
                    resource: None,
                });
                None
            }
            None => None,
        };

        let entry = ResourceEntry {
            cls: path.cls.clone(),
            params,
            avail,
            acquired,
        };
        tree_insert(&mut self.resources, &path, entry.clone());
        changes.push(Change::ResourceChanged {
            path,
            resource: Some(entry),
        });
        Ok(changes)
    }

    /// Remove a resource; one bound by a place is kept as unavailable
    pub fn remove_resource(&mut self, path: &ResourcePath) -> Result<Vec<Change>> {
        if let Some(pending) = self
            .deferred
            .values_mut()
            .find(|u| u.as_ref().is_some_and(|u| &u.path == path))
        {
            *pending = None;
            return Ok(Vec::new());
        }
        let entry = self
            .resource(path)
            .ok_or_else(|| RegistryError::InvalidResource(path.clone()))?;
        if entry.acquired.is_some() {
            self.deferred.insert(path.clone(), None);
            Ok(self.mark_unavailable(path).into_iter().collect())
        } else {
            tree_remove(&mut self.resources, path);
            Ok(vec![Change::ResourceChanged {
                path: path.clone(),
                resource: None,
            }])
        }
    }

    /// Replace an exporter's full resource set
    pub fn sync_exporter(
        &mut self,
        exporter: &str,
        resources: Vec<ResourceUpdate>,
    ) -> Result<Vec<Change>> {
        if let Some(bad) = resources.iter().find(|u| u.path.exporter != exporter) {
            return Err(RegistryError::InvalidResource(bad.path.clone()));
        }

        let keep: BTreeSet<ResourcePath> = resources.iter().map(|u| u.path.clone()).collect();
        let stale: Vec<ResourcePath> = self
            .exporter_paths(exporter)
            .into_iter()
            .filter(|p| !keep.contains(p))
            .collect();

        let mut changes = Vec::new();
        for path in &stale {
            changes.extend(self.remove_resource(path)?);
        }
        for update in resources {
            changes.extend(self.upsert_resource(update)?);
        }
        Ok(changes)
    }

    /// Drop an exporter's resources after it disconnects
    ///
    /// Resources bound by an acquired place stay listed with `avail = false`
    /// so the holder notices; they are pruned when the place is released.
    /// Updates deferred for them are dropped with the exporter.
    pub fn remove_exporter(&mut self, exporter: &str) -> Vec<Change> {
        self.online.remove(exporter);
        self.deferred.retain(|path, _| path.exporter != exporter);
        let mut changes = Vec::new();
        for path in self.exporter_paths(exporter) {
            let bound = self.binding_place(&path).is_some();
            if bound {
                changes.extend(self.mark_unavailable(&path));
            } else {
                tree_remove(&mut self.resources, &path);
                changes.push(Change::ResourceChanged {
                    path,
                    resource: None,
                });
            }
        }
        changes
    }

    fn exporter_paths(&self, exporter: &str) -> Vec<ResourcePath> {
        tree_iter(&self.resources)
            .filter(|(p, _)| p.exporter == exporter)
            .map(|(p, _)| p)
            .collect()
    }

    fn mark_unavailable(&mut self, path: &ResourcePath) -> Option<Change> {
        let entry = tree_get_mut(&mut self.resources, path)?;
        if !entry.avail {
            return None;
        }
        entry.avail = false;
        Some(Change::ResourceChanged {
            path: path.clone(),
            resource: Some(entry.clone()),
        })
    }

    // -- place administration --

    pub fn add_place(&mut self, name: &str, now: Timestamp) -> Result<Vec<Change>> {
        validate_name(name)?;
        if self.resolve(name).is_some() {
            return Err(RegistryError::NameTaken(name.to_string()));
        }
        let place = Place::new(name, now);
        self.places.insert(name.to_string(), place.clone());
        Ok(vec![place_change(&place)])
    }

    pub fn del_place(&mut self, name: &str) -> Result<Vec<Change>> {
        let place = self.lookup(name)?;
        if place.is_acquired() {
            return Err(RegistryError::PlaceAcquired(place.name.clone()));
        }
        if let Some(token) = self.live_reservation(place) {
            return Err(RegistryError::PlaceReserved {
                place: place.name.clone(),
                token: token.to_string(),
            });
        }
        let name = place.name.clone();
        if let Some(place) = self.places.remove(&name) {
            for alias in &place.aliases {
                self.aliases.remove(alias);
            }
        }
        Ok(vec![Change::PlaceChanged { name, place: None }])
    }

    pub fn add_alias(&mut self, name: &str, alias: &str, now: Timestamp) -> Result<Vec<Change>> {
        validate_name(alias)?;
        let place = self.lookup_unacquired(name)?;
        if self.resolve(alias).is_some() {
            return Err(RegistryError::NameTaken(alias.to_string()));
        }
        let name = place.name.clone();
        self.aliases.insert(alias.to_string(), name.clone());
        self.modify(&name, now, |p| {
            p.aliases.insert(alias.to_string());
        })
    }

    pub fn del_alias(&mut self, name: &str, alias: &str, now: Timestamp) -> Result<Vec<Change>> {
        let place = self.lookup_unacquired(name)?;
        if !place.aliases.contains(alias) {
            return Err(RegistryError::UnknownAlias(
                place.name.clone(),
                alias.to_string(),
            ));
        }
        let name = place.name.clone();
        self.aliases.remove(alias);
        self.modify(&name, now, |p| {
            p.aliases.remove(alias);
        })
    }

    pub fn set_comment(&mut self, name: &str, comment: &str, now: Timestamp) -> Result<Vec<Change>> {
        let name = self.lookup_unacquired(name)?.name.clone();
        self.modify(&name, now, |p| p.comment = comment.to_string())
    }

    /// Merge tags into a place; an empty value deletes the key
    pub fn set_tags(
        &mut self,
        name: &str,
        tags: &BTreeMap<String, String>,
        now: Timestamp,
    ) -> Result<Vec<Change>> {
        let place = self.lookup(name)?;
        if place.is_acquired() && !self.config.allow_tags_while_acquired {
            return Err(RegistryError::PlaceAcquired(place.name.clone()));
        }
        for (key, value) in tags {
            if !valid_tag_key(key) || value.chars().any(char::is_whitespace) {
                return Err(RegistryError::InvalidTag {
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }
        let name = place.name.clone();
        self.modify(&name, now, |p| {
            for (key, value) in tags {
                if value.is_empty() {
                    p.tags.remove(key);
                } else {
                    p.tags.insert(key.clone(), value.clone());
                }
            }
        })
    }

    pub fn add_match(
        &mut self,
        name: &str,
        pattern: &str,
        rename: Option<String>,
        now: Timestamp,
    ) -> Result<Vec<Change>> {
        let place = self.lookup_unacquired(name)?;
        let m: ResourceMatch = pattern.parse()?;
        let m = m.with_rename(rename.filter(|r| !r.is_empty()));
        if place.matches.contains(&m) {
            return Err(RegistryError::DuplicateMatch {
                place: place.name.clone(),
                pattern: m.to_string(),
            });
        }
        let name = place.name.clone();
        self.modify(&name, now, |p| p.matches.push(m))
    }

    pub fn del_match(&mut self, name: &str, pattern: &str, now: Timestamp) -> Result<Vec<Change>> {
        let place = self.lookup_unacquired(name)?;
        let m: ResourceMatch = pattern.parse()?;
        let Some(index) = place.matches.iter().position(|x| *x == m) else {
            return Err(RegistryError::NoSuchMatch {
                place: place.name.clone(),
                pattern: pattern.to_string(),
            });
        };
        let name = place.name.clone();
        self.modify(&name, now, |p| {
            p.matches.remove(index);
        })
    }

    // -- acquisition --

    /// Bind every match of a place to concrete resources, all or nothing
    pub fn acquire(&mut self, name: &str, identity: &str, now: Timestamp) -> Result<Vec<Change>> {
        let place = self.lookup(name)?;
        if let Some(owner) = &place.acquired {
            return Err(RegistryError::AlreadyAcquired {
                place: place.name.clone(),
                owner: owner.clone(),
            });
        }
        if let Some(token) = self.live_reservation(place) {
            let owner_matches = self
                .reservations
                .get(token)
                .is_some_and(|r| r.owner == identity);
            if !owner_matches {
                return Err(RegistryError::PlaceReserved {
                    place: place.name.clone(),
                    token: token.to_string(),
                });
            }
        }

        let bound = self.resolve_matches(place)?;
        let name = place.name.clone();

        let mut changes = Vec::new();
        for path in &bound {
            if let Some(entry) = tree_get_mut(&mut self.resources, path) {
                entry.acquired = Some(name.clone());
                changes.push(Change::ResourceChanged {
                    path: path.clone(),
                    resource: Some(entry.clone()),
                });
            }
        }
        changes.extend(self.modify(&name, now, |p| {
            p.acquired = Some(identity.to_string());
            p.acquired_resources = bound;
        })?);
        Ok(changes)
    }

    fn resolve_matches(&self, place: &Place) -> Result<Vec<ResourcePath>> {
        let mut bound: Vec<ResourcePath> = Vec::new();
        for m in &place.matches {
            let mut candidates = Vec::new();
            let mut holder = None;
            for (path, entry) in tree_iter(&self.resources) {
                if !entry.avail || !m.ismatch(&path) {
                    continue;
                }
                match &entry.acquired {
                    Some(other) if *other != place.name => {
                        holder.get_or_insert_with(|| other.clone());
                    }
                    _ => candidates.push(path),
                }
            }

            if candidates.is_empty() {
                let pattern = m.to_string();
                return Err(match holder {
                    Some(holder) => RegistryError::ResourceBound {
                        place: place.name.clone(),
                        pattern,
                        holder,
                    },
                    None => RegistryError::NoResource {
                        place: place.name.clone(),
                        pattern,
                    },
                });
            }
            if m.rename.is_some() && candidates.len() > 1 {
                return Err(RegistryError::AmbiguousMatch {
                    place: place.name.clone(),
                    pattern: m.to_string(),
                    candidates: candidates.len(),
                });
            }
            for path in candidates {
                if !bound.contains(&path) {
                    bound.push(path);
                }
            }
        }
        Ok(bound)
    }

    /// Release a place; `force` releases a place held by someone else
    pub fn release(
        &mut self,
        name: &str,
        identity: &str,
        force: bool,
        now: Timestamp,
    ) -> Result<Vec<Change>> {
        let place = self.lookup(name)?;
        let Some(owner) = &place.acquired else {
            return Err(RegistryError::NotAcquired(place.name.clone()));
        };
        if !force && owner != identity {
            return Err(RegistryError::NotOwner {
                place: place.name.clone(),
                owner: owner.clone(),
            });
        }
        let name = place.name.clone();
        let bound = place.acquired_resources.clone();

        let mut changes = Vec::new();
        let mut replacements = Vec::new();
        for path in &bound {
            let orphaned = !self.online.contains(&path.exporter);
            let pending = self.deferred.remove(path);
            let Some(entry) = tree_get_mut(&mut self.resources, path) else {
                continue;
            };
            entry.acquired = None;
            let withdrawn = pending.is_some() || (orphaned && !entry.avail);
            if withdrawn {
                tree_remove(&mut self.resources, path);
                changes.push(Change::ResourceChanged {
                    path: path.clone(),
                    resource: None,
                });
                replacements.extend(pending.flatten());
            } else {
                changes.push(Change::ResourceChanged {
                    path: path.clone(),
                    resource: Some(entry.clone()),
                });
            }
        }
        for update in replacements {
            changes.extend(self.upsert_resource(update)?);
        }
        changes.extend(self.modify(&name, now, |p| {
            p.acquired = None;
            p.acquired_resources.clear();
            p.allowed.clear();
        })?);
        Ok(changes)
    }

    /// Grant `user` access to a place acquired by `identity`
    pub fn allow(
        &mut self,
        name: &str,
        identity: &str,
        user: &str,
        now: Timestamp,
    ) -> Result<Vec<Change>> {
        let name = self.lookup_owned(name, identity)?;
        validate_name(user)?;
        self.modify(&name, now, |p| {
            p.allowed.insert(user.to_string());
        })
    }

    pub fn disallow(
        &mut self,
        name: &str,
        identity: &str,
        user: &str,
        now: Timestamp,
    ) -> Result<Vec<Change>> {
        let name = self.lookup_owned(name, identity)?;
        self.modify(&name, now, |p| {
            p.allowed.remove(user);
        })
    }

    // -- reservations --

    pub fn create_reservation(&mut self, reservation: Reservation) -> Result<Vec<Change>> {
        if reservation.filters.is_empty() {
            return Err(RegistryError::InvalidFilter("no filter groups".into()));
        }
        for (group, filter) in &reservation.filters {
            validate_filter(group, filter)?;
        }
        if self.reservations.contains_key(&reservation.token) {
            return Err(RegistryError::ReservationExists(reservation.token));
        }
        let change = reservation_change(&reservation);
        self.reservations
            .insert(reservation.token.clone(), reservation);
        Ok(vec![change])
    }

    pub fn cancel_reservation(&mut self, token: &str, identity: &str) -> Result<Vec<Change>> {
        self.owned_reservation(token, identity)?;
        let mut changes = Vec::new();
        if let Some(reservation) = self.reservations.remove(token) {
            changes.extend(self.clear_allocations(&reservation));
        }
        changes.push(Change::ReservationChanged {
            token: token.to_string(),
            reservation: None,
        });
        Ok(changes)
    }

    /// Extend a pending reservation's deadline to at least `deadline`
    pub fn poll_reservation(
        &mut self,
        token: &str,
        identity: &str,
        deadline: Timestamp,
    ) -> Result<Vec<Change>> {
        self.owned_reservation(token, identity)?;
        let Some(reservation) = self.reservations.get_mut(token) else {
            return Err(RegistryError::UnknownReservation(token.to_string()));
        };
        let extendable = matches!(
            reservation.state,
            ReservationState::Waiting | ReservationState::Allocated | ReservationState::Invalid
        );
        if !extendable || reservation.timeout >= deadline {
            return Ok(Vec::new());
        }
        reservation.timeout = deadline;
        Ok(vec![reservation_change(reservation)])
    }

    fn owned_reservation(&self, token: &str, identity: &str) -> Result<&Reservation> {
        let reservation = self
            .reservations
            .get(token)
            .ok_or_else(|| RegistryError::UnknownReservation(token.to_string()))?;
        if reservation.owner != identity {
            return Err(RegistryError::NotReservationOwner {
                token: token.to_string(),
                owner: reservation.owner.clone(),
            });
        }
        Ok(reservation)
    }

    /// Clear `reservation` on every place allocated to it
    pub(crate) fn clear_allocations(&mut self, reservation: &Reservation) -> Vec<Change> {
        let mut changes = Vec::new();
        for name in reservation.allocated_places() {
            if let Some(place) = self.places.get_mut(name) {
                if place.reservation.as_deref() == Some(reservation.token.as_str()) {
                    place.reservation = None;
                    changes.push(place_change(place));
                }
            }
        }
        changes
    }

    /// Token of a live reservation the place is allocated to
    fn live_reservation<'a>(&'a self, place: &'a Place) -> Option<&'a str> {
        let token = place.reservation.as_deref()?;
        let live = self.reservations.get(token).is_some_and(|r| {
            matches!(
                r.state,
                ReservationState::Allocated | ReservationState::Acquired
            )
        });
        live.then_some(token)
    }

    // -- invariants --

    /// Check the structural invariants, returning every violation found
    pub fn check_invariants(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let mut seen: HashMap<&ResourcePath, &str> = HashMap::new();

        for place in self.places.values() {
            if place.acquired.is_none() {
                if !place.acquired_resources.is_empty() {
                    violations.push(format!("{}: unacquired but has resources", place.name));
                }
                continue;
            }
            for path in &place.acquired_resources {
                if let Some(other) = seen.insert(path, place.name.as_str()) {
                    violations.push(format!("{}: bound by {} and {}", path, other, place.name));
                }
                match self.resource(path) {
                    Some(entry) if entry.acquired.as_deref() == Some(place.name.as_str()) => {}
                    _ => violations.push(format!("{}: {} not marked as bound", place.name, path)),
                }
            }
            for m in &place.matches {
                if !place.acquired_resources.iter().any(|p| m.ismatch(p)) {
                    violations.push(format!("{}: match {} is unbound", place.name, m));
                }
            }
        }

        for (path, entry) in tree_iter(&self.resources) {
            if let Some(holder) = &entry.acquired {
                if seen.get(&path).copied() != Some(holder.as_str()) {
                    violations.push(format!("{}: stale binding to {}", path, holder));
                }
            }
        }

        for (alias, name) in &self.aliases {
            if !self.places.get(name).is_some_and(|p| p.aliases.contains(alias)) {
                violations.push(format!("alias {} points at missing {}", alias, name));
            }
        }
        violations
    }

    // -- helpers --

    fn lookup(&self, name: &str) -> Result<&Place> {
        self.resolve(name)
            .and_then(|n| self.places.get(n))
            .ok_or_else(|| RegistryError::UnknownPlace(name.to_string()))
    }

    fn lookup_unacquired(&self, name: &str) -> Result<&Place> {
        let place = self.lookup(name)?;
        if place.is_acquired() {
            return Err(RegistryError::PlaceAcquired(place.name.clone()));
        }
        Ok(place)
    }

    fn lookup_owned(&self, name: &str, identity: &str) -> Result<String> {
        let place = self.lookup(name)?;
        match &place.acquired {
            None => Err(RegistryError::NotAcquired(place.name.clone())),
            Some(owner) if owner != identity => Err(RegistryError::NotOwner {
                place: place.name.clone(),
                owner: owner.clone(),
            }),
            Some(_) => Ok(place.name.clone()),
        }
    }

    fn modify(
        &mut self,
        name: &str,
        now: Timestamp,
        f: impl FnOnce(&mut Place),
    ) -> Result<Vec<Change>> {
        let place = self
            .places
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownPlace(name.to_string()))?;
        f(place);
        place.changed = now;
        Ok(vec![place_change(place)])
    }
}

pub(crate) fn place_change(place: &Place) -> Change {
    Change::PlaceChanged {
        name: place.name.clone(),
        place: Some(place.clone()),
    }
}

pub(crate) fn reservation_change(reservation: &Reservation) -> Change {
    Change::ReservationChanged {
        token: reservation.token.clone(),
        reservation: Some(reservation.clone()),
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn valid_tag_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn validate_filter(group: &str, filter: &TagFilter) -> Result<()> {
    if group.is_empty() || filter.is_empty() {
        return Err(RegistryError::InvalidFilter(format!(
            "group '{}' has no terms",
            group
        )));
    }
    if let Some((key, _)) = filter.iter().find(|(k, v)| !valid_tag_key(k) || v.is_empty()) {
        return Err(RegistryError::InvalidFilter(format!("bad key '{}'", key)));
    }
    Ok(())
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
