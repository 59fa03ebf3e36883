// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

const T0: Timestamp = 1000.0;

fn coalescer() -> Coalescer<&'static str, u32> {
    Coalescer::new(Duration::from_millis(500), 16)
}

#[test]
fn same_key_updates_merge_to_latest() {
    let mut c = coalescer();
    c.push("usb0", 1, T0);
    c.push("usb0", 2, T0 + 0.1);
    c.push("usb0", 3, T0 + 0.2);
    assert_eq!(c.len(), 1);

    assert!(c.drain_ready(T0 + 0.4).is_empty());
    assert_eq!(c.drain_ready(T0 + 0.5), vec![("usb0", 3)]);
    assert!(c.is_empty());
}

#[test]
fn window_counts_from_first_seen() {
    let mut c = coalescer();
    c.push("a", 1, T0);
    // Keeps changing, but still flushes once the first window passes
    c.push("a", 2, T0 + 0.45);
    assert_eq!(c.drain_ready(T0 + 0.5), vec![("a", 2)]);
}

#[test]
fn drain_returns_first_seen_order() {
    let mut c = coalescer();
    c.push("b", 1, T0);
    c.push("a", 1, T0 + 0.1);
    c.push("c", 1, T0 + 0.2);
    c.push("b", 2, T0 + 0.3);

    assert_eq!(c.drain_ready(T0 + 0.65), vec![("b", 2), ("a", 1)]);
    assert_eq!(c.drain_all(), vec![("c", 1)]);
}

#[test]
fn push_reports_full() {
    let mut c: Coalescer<u32, ()> = Coalescer::new(Duration::from_secs(1), 2);
    assert!(!c.push(1, (), T0));
    assert!(!c.push(1, (), T0));
    assert!(c.push(2, (), T0));
}

proptest! {
    #[test]
    fn drain_all_yields_last_value_per_key(
        updates in proptest::collection::vec((0u8..5, any::<u32>()), 0..50)
    ) {
        let mut c: Coalescer<u8, u32> = Coalescer::new(Duration::from_secs(1), 64);
        let mut expected = std::collections::BTreeMap::new();
        for (i, (k, v)) in updates.iter().enumerate() {
            c.push(*k, *v, T0 + i as f64 * 0.01);
            expected.insert(*k, *v);
        }
        let drained: std::collections::BTreeMap<u8, u32> = c.drain_all().into_iter().collect();
        prop_assert_eq!(drained, expected);
        prop_assert!(c.is_empty());
    }
}
