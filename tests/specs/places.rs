//! Place lifecycle specs
//!
//! Acquisition, access and release as seen by competing clients.

use crate::prelude::*;
use labgrid_client::power::{self, PowerAction};

#[tokio::test]
async fn acquired_place_yields_environment_and_power() {
    let lab = Lab::start().await;
    let _exporter = lab.exporter("exp1", BOARD);
    let alice = lab.client("alice").await;
    wait_avail(&alice, &console("exp1"), true).await;

    board_place(&alice, "board-a", "exp1").await;
    alice.acquire("board-a").await.unwrap();

    let place = alice.find_place("board-a").unwrap();
    assert_eq!(place.acquired.as_deref(), Some("test/alice"));
    assert_eq!(place.acquired_resources.len(), 2);

    let env = alice.get_env("board-a").unwrap();
    let resources = &env.targets["board-a"].resources;
    let serial = resources
        .iter()
        .find(|r| r.cls == "NetworkSerialPort")
        .expect("serial port in environment");
    assert_eq!(serial.params["host"], "exp1");
    assert_eq!(serial.params["port"], 4000);

    let backend = alice.power("board-a").unwrap();
    assert_eq!(power::run(&backend, PowerAction::Get).await.unwrap(), Some(true));
    assert_eq!(power::run(&backend, PowerAction::Off).await.unwrap(), None);

    alice.release("board-a", false).await.unwrap();
    let snapshot = lab.snapshot();
    assert!(!snapshot.places["board-a"].is_acquired());
    assert_eq!(tree_get(&snapshot.resources, &console("exp1")).unwrap().acquired, None);
}

#[tokio::test]
async fn other_users_need_permission() {
    let lab = Lab::start().await;
    let _exporter = lab.exporter("exp1", BOARD);
    let alice = lab.client("alice").await;
    let bob = lab.client("bob").await;
    wait_avail(&alice, &console("exp1"), true).await;
    board_place(&alice, "board-a", "exp1").await;
    alice.acquire("board-a").await.unwrap();

    assert_rejected(bob.acquire("board-a").await, ErrorKind::User);
    bob.wait_for(WAIT, |s| s.places.get("board-a").is_some_and(|p| p.is_acquired()))
        .await
        .unwrap();
    assert!(matches!(
        bob.get_env("board-a"),
        Err(ClientError::NoAccess { .. })
    ));

    alice.allow("board-a", "test/bob").await.unwrap();
    bob.wait_for(WAIT, |s| {
        s.places
            .get("board-a")
            .is_some_and(|p| p.allowed.contains("test/bob"))
    })
    .await
    .unwrap();
    assert!(bob.get_env("board-a").is_ok());
}

#[tokio::test]
async fn concurrent_acquire_has_one_winner() {
    let lab = Lab::start().await;
    let _exporter = lab.exporter("exp1", BOARD);
    let alice = lab.client("alice").await;
    let bob = lab.client("bob").await;
    wait_avail(&alice, &console("exp1"), true).await;
    board_place(&alice, "board-a", "exp1").await;

    let (a, b) = tokio::join!(alice.acquire("board-a"), bob.acquire("board-a"));
    assert_eq!(
        a.is_ok() as u8 + b.is_ok() as u8,
        1,
        "exactly one acquire succeeds: {:?} / {:?}",
        a,
        b
    );

    let winner = if a.is_ok() { "test/alice" } else { "test/bob" };
    assert_eq!(
        lab.snapshot().places["board-a"].acquired.as_deref(),
        Some(winner)
    );
}

#[tokio::test]
async fn acquire_binds_all_matches_or_nothing() {
    let lab = Lab::start().await;
    let _exporter = lab.exporter("exp1", BOARD);
    let alice = lab.client("alice").await;
    wait_avail(&alice, &console("exp1"), true).await;

    board_place(&alice, "board-a", "exp1").await;
    alice
        .add_match("board-a", "exp2/board/NetworkSerialPort", None)
        .await
        .unwrap();

    assert_rejected(alice.acquire("board-a").await, ErrorKind::Server);

    let snapshot = lab.snapshot();
    assert!(!snapshot.places["board-a"].is_acquired());
    assert!(snapshot.places["board-a"].acquired_resources.is_empty());
    assert_eq!(tree_get(&snapshot.resources, &console("exp1")).unwrap().acquired, None);
}

#[tokio::test]
async fn released_place_can_be_acquired_by_someone_else() {
    let lab = Lab::start().await;
    let _exporter = lab.exporter("exp1", BOARD);
    let alice = lab.client("alice").await;
    let bob = lab.client("bob").await;
    wait_avail(&alice, &console("exp1"), true).await;
    board_place(&alice, "board-a", "exp1").await;

    alice.acquire("board-a").await.unwrap();
    alice.release("board-a", false).await.unwrap();
    bob.acquire("board-a").await.unwrap();

    let snapshot = lab.snapshot();
    assert_eq!(snapshot.places["board-a"].acquired.as_deref(), Some("test/bob"));
    assert_eq!(
        tree_get(&snapshot.resources, &console("exp1")).unwrap().acquired.as_deref(),
        Some("board-a")
    );
}

#[tokio::test]
async fn resources_are_shared_by_one_place_at_a_time() {
    let lab = Lab::start().await;
    let _exporter = lab.exporter("exp1", BOARD);
    let alice = lab.client("alice").await;
    wait_avail(&alice, &console("exp1"), true).await;
    board_place(&alice, "board-a", "exp1").await;
    board_place(&alice, "board-b", "exp1").await;

    alice.acquire("board-a").await.unwrap();
    assert_rejected(alice.acquire("board-b").await, ErrorKind::Server);

    alice.release("board-a", false).await.unwrap();
    alice.acquire("board-b").await.unwrap();
}
