//! Exporter presence specs
//!
//! What clients see when exporters come, go and come back.

use crate::prelude::*;

const SPARE: &str = r#"
[group.spare]
NetworkSerialPort = { name = "console", host = "exp1", port = 4001 }
"#;

fn spare() -> ResourcePath {
    path("exp1", "spare", "NetworkSerialPort", "console")
}

#[tokio::test]
async fn exporter_disconnect_keeps_bound_resources_unavailable() {
    let lab = Lab::start().await;
    let exporter = lab.exporter("exp1", &format!("{}{}", BOARD, SPARE));
    let alice = lab.client("alice").await;
    wait_avail(&alice, &console("exp1"), true).await;
    wait_avail(&alice, &spare(), true).await;
    board_place(&alice, "board-a", "exp1").await;
    alice.acquire("board-a").await.unwrap();
    let mut bindings = alice.bind("board-a").unwrap();

    exporter.stop();
    wait_avail(&alice, &console("exp1"), false).await;
    alice
        .wait_for(WAIT, |s| tree_get(&s.resources, &spare()).is_none())
        .await
        .unwrap();

    let place = alice.find_place("board-a").unwrap();
    assert_eq!(place.acquired.as_deref(), Some("test/alice"));
    assert!(alice.resolve_conflicts(&mut bindings));
    assert!(matches!(
        bindings.env(),
        Err(ClientError::StaleBinding { .. })
    ));
    assert!(matches!(
        alice.get_env("board-a"),
        Err(ClientError::Unavailable(_))
    ));
}

#[tokio::test]
async fn reconnected_exporter_restores_bound_resources() {
    let lab = Lab::start().await;
    let exporter = lab.exporter("exp1", BOARD);
    let alice = lab.client("alice").await;
    wait_avail(&alice, &console("exp1"), true).await;
    board_place(&alice, "board-a", "exp1").await;
    alice.acquire("board-a").await.unwrap();

    exporter.stop();
    wait_avail(&alice, &console("exp1"), false).await;

    let _exporter = lab.exporter("exp1", BOARD);
    wait_avail(&alice, &console("exp1"), true).await;

    let snapshot = alice.snapshot();
    assert_eq!(
        tree_get(&snapshot.resources, &console("exp1")).unwrap().acquired.as_deref(),
        Some("board-a")
    );
    assert!(alice.get_env("board-a").is_ok());
}

#[tokio::test]
async fn late_joiner_sees_the_coordinator_state() {
    let lab = Lab::start().await;
    let _exporter = lab.exporter("exp1", BOARD);
    let alice = lab.client("alice").await;
    wait_avail(&alice, &console("exp1"), true).await;
    board_place(&alice, "board-a", "exp1").await;
    alice.add_alias("board-a", "pi").await.unwrap();
    alice.acquire("board-a").await.unwrap();

    let bob = lab.client("bob").await;
    let coordinator = lab.snapshot();
    similar_asserts::assert_eq!(bob.places(), coordinator.places);
    similar_asserts::assert_eq!(bob.resources(), coordinator.resources);
    assert_eq!(bob.find_place("pi").unwrap().name, "board-a");

    // Changes after the join keep arriving
    alice.set_comment("board-a", "rack 3").await.unwrap();
    bob.wait_for(WAIT, |s| {
        s.places.get("board-a").is_some_and(|p| p.comment == "rack 3")
    })
    .await
    .unwrap();
    alice.release("board-a", false).await.unwrap();
    bob.wait_for(WAIT, |s| {
        s.places.get("board-a").is_some_and(|p| !p.is_acquired())
    })
    .await
    .unwrap();
    assert!(bob.seq() >= coordinator.seq);
}

#[tokio::test]
async fn swapped_resource_class_appears_after_release() {
    const RAW_BOARD: &str = r#"
[group.board]
RawSerialPort = { name = "console", device = "ttyS0" }
NetworkPowerPort = { name = "power", model = "fake", host = "pdu", index = 3, powered = true }
"#;
    let raw = path("exp1", "board", "RawSerialPort", "console");
    let power = path("exp1", "board", "NetworkPowerPort", "power");

    let lab = Lab::start().await;
    let exporter = lab.exporter("exp1", BOARD);
    let alice = lab.client("alice").await;
    wait_avail(&alice, &console("exp1"), true).await;
    board_place(&alice, "board-a", "exp1").await;
    alice.acquire("board-a").await.unwrap();

    exporter.stop();
    wait_avail(&alice, &power, false).await;
    let _exporter = lab.exporter("exp1", RAW_BOARD);
    wait_avail(&alice, &power, true).await;

    // The bound console keeps its class while the place is held
    let snapshot = alice.snapshot();
    let held = tree_get(&snapshot.resources, &console("exp1")).unwrap();
    assert!(!held.avail);
    assert!(tree_get(&snapshot.resources, &raw).is_none());

    alice.release("board-a", false).await.unwrap();
    alice
        .wait_for(WAIT, |s| {
            tree_get(&s.resources, &console("exp1")).is_none()
                && tree_get(&s.resources, &raw).is_some_and(|e| e.avail)
        })
        .await
        .unwrap();
}
