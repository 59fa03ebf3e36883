//! Reservation specs
//!
//! Tag-filtered reservations allocate places in order and gate acquisition.

use crate::prelude::*;
use lg_core::reservation::DEFAULT_GROUP;
use lg_core::{parse_filter, ReservationState, TagFilter};

fn board(tag: &str) -> BTreeMap<String, TagFilter> {
    BTreeMap::from([(
        DEFAULT_GROUP.to_string(),
        parse_filter(&format!("board={}", tag)).unwrap(),
    )])
}

async fn tagged_place(session: &ClientSession, name: &str, tag: &str) {
    session.add_place(name).await.unwrap();
    session
        .set_tags(name, BTreeMap::from([("board".to_string(), tag.to_string())]))
        .await
        .unwrap();
}

#[tokio::test]
async fn reservation_gates_acquisition() {
    let lab = Lab::start().await;
    let alice = lab.client("alice").await;
    let bob = lab.client("bob").await;
    tagged_place(&alice, "board-a", "rpi4").await;

    let reservation = alice.create_reservation(board("rpi4"), 0).await.unwrap();
    let reservation = alice.wait_reservation(&reservation.token).await.unwrap();
    assert_eq!(reservation.state, ReservationState::Allocated);
    assert_eq!(reservation.allocated_places().collect::<Vec<_>>(), vec!["board-a"]);

    assert_rejected(bob.acquire("board-a").await, ErrorKind::Server);
    alice.acquire("board-a").await.unwrap();
}

#[tokio::test]
async fn cancelled_reservation_hands_the_place_on() {
    let lab = Lab::start().await;
    let alice = lab.client("alice").await;
    let bob = lab.client("bob").await;
    tagged_place(&alice, "board-a", "rpi4").await;

    let first = alice.create_reservation(board("rpi4"), 0).await.unwrap();
    let first = alice.wait_reservation(&first.token).await.unwrap();
    assert_eq!(first.state, ReservationState::Allocated);

    let second = bob.create_reservation(board("rpi4"), 0).await.unwrap();
    assert_eq!(second.state, ReservationState::Waiting);

    alice.cancel_reservation(&first.token).await.unwrap();
    let second = bob.wait_reservation(&second.token).await.unwrap();
    assert_eq!(second.state, ReservationState::Allocated);
    bob.acquire("board-a").await.unwrap();
}

#[tokio::test]
async fn reservation_for_unknown_tags_stays_pending() {
    let lab = Lab::start().await;
    let alice = lab.client("alice").await;
    tagged_place(&alice, "board-a", "rpi4").await;

    let reservation = alice.create_reservation(board("imx8"), 0).await.unwrap();
    assert!(reservation.state.is_pending());
    assert!(reservation.allocated_places().next().is_none());
}
