// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

const DOCUMENT: &str = r#"
[places.board-a]
comment = "rack 3"
aliases = ["a"]
matches = ["exp1/board-a/*", "exp1/power/NetworkPowerPort/3 -> power"]
tags = { board = "rpi4" }

[places.board-b]
"#;

fn document() -> PlacesDocument {
    PlacesDocument::parse(DOCUMENT).unwrap()
}

/// What the coordinator holds after every action of a plan ran
fn converge(current: &BTreeMap<String, Place>, actions: &[SyncAction]) -> BTreeMap<String, Place> {
    let mut places = current.clone();
    for action in actions {
        match action.clone() {
            SyncAction::AddPlace { place } => {
                places.insert(place.clone(), Place::new(place, 1.0));
            }
            SyncAction::DelPlace { place } => {
                places.remove(&place);
            }
            SyncAction::AddAlias { place, alias } => {
                places.get_mut(&place).unwrap().aliases.insert(alias);
            }
            SyncAction::DelAlias { place, alias } => {
                places.get_mut(&place).unwrap().aliases.remove(&alias);
            }
            SyncAction::SetComment { place, comment } => {
                places.get_mut(&place).unwrap().comment = comment;
            }
            SyncAction::AddMatch {
                place,
                pattern,
                rename,
            } => {
                let m = pattern.parse::<ResourceMatch>().unwrap().with_rename(rename);
                places.get_mut(&place).unwrap().matches.push(m);
            }
            SyncAction::DelMatch { place, pattern } => {
                let m = pattern.parse::<ResourceMatch>().unwrap();
                places.get_mut(&place).unwrap().matches.retain(|x| *x != m);
            }
            SyncAction::SetTags { place, tags } => {
                let p = places.get_mut(&place).unwrap();
                for (key, value) in tags {
                    if value.is_empty() {
                        p.tags.remove(&key);
                    } else {
                        p.tags.insert(key, value);
                    }
                }
            }
        }
    }
    places
}

#[test]
fn empty_coordinator_gets_every_place() {
    let actions = plan(&BTreeMap::new(), &document(), false).unwrap();
    let rendered: Vec<String> = actions.iter().map(|a| a.to_string()).collect();
    assert_eq!(
        rendered,
        vec![
            "add-place board-a",
            "board-a: add-alias a",
            "board-a: set-comment \"rack 3\"",
            "board-a: add-match exp1/board-a/*",
            "board-a: add-match exp1/power/NetworkPowerPort/3 -> power",
            "board-a: set-tags board=rpi4",
            "add-place board-b",
        ]
    );
}

#[test]
fn converged_target_plans_nothing() {
    let first = plan(&BTreeMap::new(), &document(), true).unwrap();
    let places = converge(&BTreeMap::new(), &first);
    assert!(plan(&places, &document(), true).unwrap().is_empty());
}

#[test]
fn drift_is_corrected_minimally() {
    let first = plan(&BTreeMap::new(), &document(), false).unwrap();
    let mut places = converge(&BTreeMap::new(), &first);
    {
        let a = places.get_mut("board-a").unwrap();
        a.aliases.insert("stale".into());
        a.tags.insert("owner".into(), "ci".into());
        a.matches[1].rename = Some("outlet".into());
    }

    let actions = plan(&places, &document(), false).unwrap();
    assert_eq!(
        actions,
        vec![
            SyncAction::DelAlias {
                place: "board-a".into(),
                alias: "stale".into(),
            },
            SyncAction::DelMatch {
                place: "board-a".into(),
                pattern: "exp1/power/NetworkPowerPort/3".into(),
            },
            SyncAction::AddMatch {
                place: "board-a".into(),
                pattern: "exp1/power/NetworkPowerPort/3".into(),
                rename: Some("power".into()),
            },
            SyncAction::SetTags {
                place: "board-a".into(),
                tags: BTreeMap::from([("owner".to_string(), String::new())]),
            },
        ]
    );
    let places = converge(&places, &actions);
    assert!(plan(&places, &document(), false).unwrap().is_empty());
}

#[parameterized(
    keep = { false, 0 },
    prune = { true, 1 },
)]
fn undeclared_places_are_deleted_only_when_pruning(prune: bool, deletions: usize) {
    let mut current = BTreeMap::new();
    current.insert("legacy".to_string(), Place::new("legacy", 1.0));
    let actions = plan(&current, &document(), prune).unwrap();
    let deleted = actions
        .iter()
        .filter(|a| matches!(a, SyncAction::DelPlace { place } if place == "legacy"))
        .count();
    assert_eq!(deleted, deletions);
    if prune {
        assert!(matches!(actions[0], SyncAction::DelPlace { .. }));
    }
}

#[test]
fn bad_pattern_names_the_place() {
    let doc = PlacesDocument::parse("[places.x]\nmatches = [\"exp1/board\"]\n").unwrap();
    let err = plan(&BTreeMap::new(), &doc, false).unwrap_err();
    assert!(matches!(err, SyncError::Match { ref place, .. } if place == "x"));
    assert!(err.to_string().contains("exporter/group/cls[/name]"));
}

#[test]
fn unknown_keys_are_rejected() {
    assert!(matches!(
        PlacesDocument::parse("[places.x]\nmatch = []\n"),
        Err(SyncError::Parse(_))
    ));
}

#[test]
fn actions_map_to_requests() {
    let request = SyncAction::AddMatch {
        place: "board-a".into(),
        pattern: "exp1/*/PowerPort".into(),
        rename: Some("power".into()),
    }
    .into_request();
    assert_eq!(
        request,
        Request::AddPlaceMatch {
            place: "board-a".into(),
            pattern: "exp1/*/PowerPort".into(),
            rename: Some("power".into()),
        }
    );
}
