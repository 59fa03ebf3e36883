// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::reservation::{parse_filter, TagFilter};

const T0: Timestamp = 1_700_000_000.0;

fn config() -> SchedulerConfig {
    SchedulerConfig::default()
}

fn tagged_registry(places: &[(&str, &str)]) -> Registry {
    let mut reg = Registry::default();
    for (name, board) in places {
        reg.add_place(name, T0).unwrap();
        let tags = BTreeMap::from([("board".to_string(), board.to_string())]);
        reg.set_tags(name, &tags, T0).unwrap();
    }
    reg
}

fn reserve(reg: &mut Registry, token: &str, owner: &str, prio: i64, created: Timestamp, filter: &str) {
    let filters = BTreeMap::from([("main".to_string(), parse_filter(filter).unwrap())]);
    let r = Reservation::new(token, owner, prio, filters, created, config().deadline(created));
    reg.create_reservation(r).unwrap();
}

fn state(reg: &Registry, token: &str) -> ReservationState {
    reg.reservation(token).unwrap().state
}

fn allocated(reg: &Registry, token: &str) -> Vec<String> {
    reg.reservation(token)
        .unwrap()
        .allocated_places()
        .map(String::from)
        .collect()
}

#[test]
fn waiting_reservation_gets_allocated() {
    let mut reg = tagged_registry(&[("rpi-1", "rpi")]);
    reserve(&mut reg, "T1", "A", 0, T0, "board=rpi");

    let changes = schedule(&mut reg, T0 + 1.0, &config());
    assert_eq!(state(&reg, "T1"), ReservationState::Allocated);
    assert_eq!(allocated(&reg, "T1"), vec!["rpi-1"]);
    assert_eq!(reg.place("rpi-1").unwrap().reservation.as_deref(), Some("T1"));
    // One place change, one reservation change
    assert_eq!(changes.len(), 2);

    // Stable across sweeps
    assert!(schedule(&mut reg, T0 + 2.0, &config()).is_empty());
    assert_eq!(allocated(&reg, "T1"), vec!["rpi-1"]);
}

#[test]
fn older_reservation_wins_at_equal_priority() {
    let mut reg = tagged_registry(&[("rpi-1", "rpi")]);
    reserve(&mut reg, "NEW", "B", 0, T0 + 5.0, "board=rpi");
    reserve(&mut reg, "OLD", "A", 0, T0, "board=rpi");

    schedule(&mut reg, T0 + 6.0, &config());
    assert_eq!(state(&reg, "OLD"), ReservationState::Allocated);
    assert_eq!(state(&reg, "NEW"), ReservationState::Waiting);
}

#[test]
fn higher_priority_goes_first() {
    let mut reg = tagged_registry(&[("rpi-1", "rpi")]);
    reserve(&mut reg, "OLD", "A", 0, T0, "board=rpi");
    reserve(&mut reg, "URGENT", "B", 10, T0 + 5.0, "board=rpi");

    schedule(&mut reg, T0 + 6.0, &config());
    assert_eq!(state(&reg, "URGENT"), ReservationState::Allocated);
    assert_eq!(state(&reg, "OLD"), ReservationState::Waiting);
}

#[test]
fn place_acquired_by_someone_else_is_skipped() {
    let mut reg = tagged_registry(&[("rpi-1", "rpi"), ("rpi-2", "rpi")]);
    reg.acquire("rpi-1", "C", T0).unwrap();
    reserve(&mut reg, "T1", "A", 0, T0, "board=rpi");

    schedule(&mut reg, T0 + 1.0, &config());
    assert_eq!(allocated(&reg, "T1"), vec!["rpi-2"]);
}

#[test]
fn groups_are_allocated_together_or_not_at_all() {
    let mut reg = tagged_registry(&[("rpi-1", "rpi"), ("bbb-1", "bbb")]);
    reg.acquire("bbb-1", "C", T0).unwrap();
    let filters = BTreeMap::from([
        ("main".to_string(), parse_filter("board=rpi").unwrap()),
        ("peer".to_string(), parse_filter("board=bbb").unwrap()),
    ]);
    reg.create_reservation(Reservation::new("T1", "A", 0, filters, T0, T0 + 60.0))
        .unwrap();

    schedule(&mut reg, T0 + 1.0, &config());
    assert_eq!(state(&reg, "T1"), ReservationState::Waiting);
    assert!(reg.place("rpi-1").unwrap().reservation.is_none());

    reg.release("bbb-1", "C", false, T0 + 2.0).unwrap();
    schedule(&mut reg, T0 + 2.0, &config());
    assert_eq!(state(&reg, "T1"), ReservationState::Allocated);
    let mut places = allocated(&reg, "T1");
    places.sort();
    assert_eq!(places, vec!["bbb-1", "rpi-1"]);
}

#[test]
fn two_groups_never_share_a_place() {
    let mut reg = tagged_registry(&[("rpi-1", "rpi")]);
    let filters = BTreeMap::from([
        ("a".to_string(), parse_filter("board=rpi").unwrap()),
        ("b".to_string(), parse_filter("board=rpi").unwrap()),
    ]);
    reg.create_reservation(Reservation::new("T1", "A", 0, filters, T0, T0 + 60.0))
        .unwrap();
    schedule(&mut reg, T0 + 1.0, &config());
    assert_eq!(state(&reg, "T1"), ReservationState::Waiting);
}

#[test]
fn unmatchable_filter_is_invalid_until_a_place_appears() {
    let mut reg = tagged_registry(&[("rpi-1", "rpi")]);
    reserve(&mut reg, "T1", "A", 0, T0, "board=imx8");

    schedule(&mut reg, T0 + 1.0, &config());
    assert_eq!(state(&reg, "T1"), ReservationState::Invalid);

    reg.add_place("imx-1", T0).unwrap();
    let tags: TagFilter = BTreeMap::from([("board".to_string(), "imx8".to_string())]);
    reg.set_tags("imx-1", &tags, T0).unwrap();
    schedule(&mut reg, T0 + 2.0, &config());
    assert_eq!(state(&reg, "T1"), ReservationState::Allocated);
}

#[test]
fn allocated_then_acquired_then_completed() {
    let mut reg = tagged_registry(&[("rpi-1", "rpi")]);
    reserve(&mut reg, "T1", "A", 0, T0, "board=rpi");
    schedule(&mut reg, T0 + 1.0, &config());

    // Someone else cannot take the allocated place
    assert!(reg.acquire("rpi-1", "B", T0 + 2.0).is_err());

    reg.acquire("rpi-1", "A", T0 + 2.0).unwrap();
    schedule(&mut reg, T0 + 2.0, &config());
    assert_eq!(state(&reg, "T1"), ReservationState::Acquired);

    // No polling needed once acquired
    schedule(&mut reg, T0 + 500.0, &config());
    assert_eq!(state(&reg, "T1"), ReservationState::Acquired);

    reg.release("rpi-1", "A", false, T0 + 501.0).unwrap();
    schedule(&mut reg, T0 + 501.0, &config());
    assert_eq!(state(&reg, "T1"), ReservationState::Expired);
    assert!(reg.place("rpi-1").unwrap().reservation.is_none());

    // Retained, then collected
    schedule(&mut reg, T0 + 560.0, &config());
    assert!(reg.reservation("T1").is_some());
    let changes = schedule(&mut reg, T0 + 562.0, &config());
    assert!(reg.reservation("T1").is_none());
    assert!(changes.iter().any(Change::is_tombstone));
}

#[test]
fn expiry_releases_allocation_to_next_waiter() {
    let mut reg = tagged_registry(&[("rpi-1", "rpi")]);
    reserve(&mut reg, "T1", "A", 0, T0, "board=rpi");
    schedule(&mut reg, T0 + 1.0, &config());

    // B keeps polling, A does not
    reserve(&mut reg, "T2", "B", 0, T0 + 30.0, "board=rpi");
    reg.poll_reservation("T2", "B", T0 + 120.0).unwrap();
    schedule(&mut reg, T0 + 40.0, &config());
    assert_eq!(state(&reg, "T2"), ReservationState::Waiting);

    schedule(&mut reg, T0 + 61.0, &config());
    assert_eq!(state(&reg, "T1"), ReservationState::Expired);
    assert!(reg.reservation("T1").unwrap().allocations.is_empty());
    assert_eq!(state(&reg, "T2"), ReservationState::Allocated);
    assert_eq!(reg.place("rpi-1").unwrap().reservation.as_deref(), Some("T2"));
}

#[test]
fn polling_keeps_reservation_alive() {
    let mut reg = tagged_registry(&[]);
    reserve(&mut reg, "T1", "A", 0, T0, "board=rpi");
    for step in 1..5 {
        let now = T0 + 50.0 * step as f64;
        reg.poll_reservation("T1", "A", config().deadline(now)).unwrap();
        schedule(&mut reg, now, &config());
        assert_ne!(state(&reg, "T1"), ReservationState::Expired);
    }
}

#[test]
fn cancel_frees_allocated_place() {
    let mut reg = tagged_registry(&[("rpi-1", "rpi")]);
    reserve(&mut reg, "T1", "A", 0, T0, "board=rpi");
    schedule(&mut reg, T0 + 1.0, &config());

    reg.cancel_reservation("T1", "A").unwrap();
    assert!(reg.place("rpi-1").unwrap().reservation.is_none());
    reg.acquire("rpi-1", "B", T0 + 2.0).unwrap();
}

#[test]
fn config_parses_human_durations() {
    let config: SchedulerConfig =
        serde_json::from_str(r#"{"reservation_timeout": "2m", "expired_retention": "30s"}"#)
            .unwrap();
    assert_eq!(config.reservation_timeout, Duration::from_secs(120));
    assert_eq!(config.expired_retention, Duration::from_secs(30));
    assert_eq!(config.deadline(T0), T0 + 120.0);

    let defaults: SchedulerConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(defaults, SchedulerConfig::default());
}
