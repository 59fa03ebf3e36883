//! Declarative place sync specs

use crate::prelude::*;
use labgrid_client::sync::{self, PlacesDocument};

const PLACES: &str = r#"
[places.board-a]
comment = "rack 3"
aliases = ["a"]
matches = ["exp1/board/*", "exp1/board/NetworkPowerPort/power -> power"]
tags = { board = "rpi4" }

[places.board-b]
"#;

#[tokio::test]
async fn sync_converges_and_then_plans_nothing() {
    let lab = Lab::start().await;
    let alice = lab.client("alice").await;
    alice.add_place("stale").await.unwrap();
    let document = PlacesDocument::parse(PLACES).unwrap();

    let actions = sync::plan(&alice.places(), &document, true).unwrap();
    assert!(!actions.is_empty());
    let applied = sync::apply(&alice, actions).await.unwrap();
    assert!(applied > 0);

    let places = lab.snapshot().places;
    assert_eq!(places.keys().collect::<Vec<_>>(), vec!["board-a", "board-b"]);
    let board = &places["board-a"];
    assert_eq!(board.comment, "rack 3");
    assert!(board.aliases.contains("a"));
    assert_eq!(board.tags["board"], "rpi4");
    assert_eq!(board.matches.len(), 2);

    let again = sync::plan(&alice.places(), &document, true).unwrap();
    assert!(again.is_empty(), "second run planned {:?}", again);
}
