// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::Category;
use lg_coordinator::protocol::{self, DEFAULT_TIMEOUT};
use lg_coordinator::{lifecycle, ClientFrame, Config, Coordinator, ServerFrame};
use lg_core::resource::tree_get;
use lg_core::{ErrorKind, Params, ResourcePath, ResourceUpdate};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use yare::parameterized;

const WAIT: Duration = Duration::from_secs(5);

async fn coordinator() -> Coordinator {
    let config = Config {
        listen: "127.0.0.1:0".parse().unwrap(),
        ..Config::default()
    };
    lifecycle::startup(&config).await.unwrap()
}

async fn session(coordinator: &Coordinator, identity: &str) -> ClientSession {
    let options = SessionOptions {
        identity: identity.to_string(),
        timeout: DEFAULT_TIMEOUT,
        heartbeat: None,
    };
    ClientSession::join(&coordinator.local_addr().to_string(), options)
        .await
        .unwrap()
}

/// Minimal exporter speaking the wire protocol directly
struct FakeExporter {
    stream: TcpStream,
    next_id: u64,
}

impl FakeExporter {
    async fn connect(coordinator: &Coordinator, name: &str, resources: Vec<ResourceUpdate>) -> Self {
        let stream = TcpStream::connect(coordinator.local_addr()).await.unwrap();
        let mut exporter = Self { stream, next_id: 1 };
        exporter
            .call(Request::Hello {
                role: Role::Exporter,
                name: name.to_string(),
                version: PROTOCOL_VERSION.to_string(),
            })
            .await;
        let response = exporter.call(Request::SyncResources { resources }).await;
        assert_eq!(response, Response::Ok);
        exporter
    }

    async fn call(&mut self, request: Request) -> Response {
        let id = self.next_id;
        self.next_id += 1;
        protocol::write_frame(&mut self.stream, &ClientFrame { id, request }, DEFAULT_TIMEOUT)
            .await
            .unwrap();
        loop {
            let frame: ServerFrame = protocol::read_frame(&mut self.stream).await.unwrap();
            if let ServerFrame::Response { id: got, response } = frame {
                assert_eq!(got, id);
                return response;
            }
        }
    }
}

fn serial(exporter: &str, avail: bool) -> ResourceUpdate {
    ResourceUpdate {
        path: ResourcePath::new(exporter, "board", "NetworkSerialPort", "console"),
        params: Params::from([
            ("host".to_string(), json!(exporter)),
            ("port".to_string(), json!(4000)),
        ]),
        avail,
    }
}

/// Place `name` matching `exp1`'s serial console
async fn board(session: &ClientSession, name: &str) {
    session.add_place(name).await.unwrap();
    session
        .add_match(name, "exp1/board/NetworkSerialPort", None)
        .await
        .unwrap();
}

async fn published(session: &ClientSession, path: &ResourcePath, avail: bool) {
    session
        .wait_for(WAIT, |s| {
            tree_get(&s.resources, path).is_some_and(|e| e.avail == avail)
        })
        .await
        .unwrap();
}

/// Places by `(name, alias)`; an empty alias means none
fn places(names: &[(&str, &str)]) -> BTreeMap<String, Place> {
    names
        .iter()
        .map(|(name, alias)| {
            let mut place = Place::new(*name, 1.0);
            if !alias.is_empty() {
                place.aliases.insert(alias.to_string());
            }
            (name.to_string(), place)
        })
        .collect()
}

#[parameterized(
    exact = { "rpi-1", "rpi-1" },
    exact_beats_substring = { "rpi", "rpi" },
    alias = { "lab-a", "rpi-1" },
    unique_substring = { "bbb", "bbb-7" },
    substring_of_alias = { "ab-b", "rpi-2" },
)]
fn find_place_resolves(pattern: &str, expected: &str) {
    let places = places(&[
        ("rpi", ""),
        ("rpi-1", "lab-a"),
        ("rpi-2", "lab-b"),
        ("bbb-7", ""),
    ]);
    assert_eq!(find_place(&places, pattern).unwrap().name, expected);
}

#[test]
fn find_place_reports_ambiguity_with_candidates() {
    let places = places(&[("rpi-1", ""), ("rpi-2", ""), ("bbb", "")]);
    match find_place(&places, "rpi-") {
        Err(ClientError::AmbiguousPlace { candidates, .. }) => {
            assert_eq!(candidates, vec!["rpi-1", "rpi-2"]);
        }
        other => panic!("expected ambiguity, got {:?}", other),
    }
}

#[test]
fn find_place_reports_no_match_with_known_places() {
    let places = places(&[("rpi-1", ""), ("bbb", "")]);
    match find_place(&places, "imx") {
        Err(e @ ClientError::UnknownPlace { .. }) => {
            assert_eq!(e.category(), Category::User);
            if let ClientError::UnknownPlace { candidates, .. } = e {
                assert_eq!(candidates, vec!["bbb", "rpi-1"]);
            }
        }
        other => panic!("expected no match, got {:?}", other),
    }
}

#[test]
fn identity_uses_overrides() {
    // Only the format is checked; the environment is shared between tests
    let identity = default_identity();
    assert_eq!(identity.split('/').count(), 2);
    assert!(!identity.starts_with('/'));
}

#[tokio::test]
async fn own_mutation_is_mirrored_when_call_returns() {
    let coordinator = coordinator().await;
    let alice = session(&coordinator, "host/alice").await;

    alice.add_place("board-a").await.unwrap();
    assert!(alice.places().contains_key("board-a"));

    alice.add_alias("board-a", "a").await.unwrap();
    alice.set_comment("board-a", "rack 3").await.unwrap();
    alice
        .set_tags("board-a", BTreeMap::from([("board".to_string(), "rpi4".to_string())]))
        .await
        .unwrap();
    let place = alice.find_place("a").unwrap();
    assert_eq!(place.comment, "rack 3");
    assert_eq!(place.tags["board"], "rpi4");

    alice.del_alias("board-a", "a").await.unwrap();
    alice.del_place("board-a").await.unwrap();
    assert!(alice.places().is_empty());
}

#[tokio::test]
async fn fetches_agree_with_the_mirror() {
    let coordinator = coordinator().await;
    let alice = session(&coordinator, "host/alice").await;
    let _exporter = FakeExporter::connect(&coordinator, "exp1", vec![serial("exp1", true)]).await;
    alice.add_place("board-a").await.unwrap();
    published(&alice, &serial("exp1", true).path, true).await;

    assert_eq!(alice.fetch_places().await.unwrap(), alice.places());
    assert_eq!(alice.fetch_resources().await.unwrap(), alice.resources());
    assert!(alice.fetch_reservations().await.unwrap().is_empty());
}

#[tokio::test]
async fn join_sees_existing_state_and_later_changes() {
    let coordinator = coordinator().await;
    let alice = session(&coordinator, "host/alice").await;
    alice.add_place("board-a").await.unwrap();

    let bob = session(&coordinator, "host/bob").await;
    assert!(bob.places().contains_key("board-a"));
    let joined_at = bob.seq();

    alice.add_place("board-b").await.unwrap();
    bob.wait_for(WAIT, |s| s.places.contains_key("board-b"))
        .await
        .unwrap();
    assert!(bob.seq() > joined_at);
    assert_eq!(bob.snapshot().places, alice.snapshot().places);
}

#[tokio::test]
async fn acquire_env_allow_release() {
    let coordinator = coordinator().await;
    let _exporter = FakeExporter::connect(&coordinator, "exp1", vec![serial("exp1", true)]).await;
    let alice = session(&coordinator, "host/alice").await;
    let bob = session(&coordinator, "host/bob").await;
    published(&alice, &serial("exp1", true).path, true).await;
    board(&alice, "board-a").await;

    alice.acquire("board-a").await.unwrap();
    let place = alice.find_place("board-a").unwrap();
    assert_eq!(place.acquired.as_deref(), Some("host/alice"));
    assert_eq!(place.acquired_resources, vec![serial("exp1", true).path]);

    let env = alice.get_env("board-a").unwrap();
    assert_eq!(env.targets["board-a"].resources[0].params["port"], 4000);

    bob.wait_for(WAIT, |s| {
        s.places.get("board-a").is_some_and(|p| p.acquired.is_some())
    })
        .await
        .unwrap();
    assert!(matches!(
        bob.get_env("board-a"),
        Err(ClientError::NoAccess { holder, .. }) if holder == "host/alice"
    ));

    alice.allow("board-a", "host/bob").await.unwrap();
    bob.wait_for(WAIT, |s| {
        s.places
            .get("board-a")
            .is_some_and(|p| p.allowed.contains("host/bob"))
    })
        .await
        .unwrap();
    assert!(bob.get_env("board-a").is_ok());

    alice.disallow("board-a", "host/bob").await.unwrap();
    assert!(!alice.find_place("board-a").unwrap().allowed.contains("host/bob"));

    alice.release("board-a", false).await.unwrap();
    assert!(matches!(
        alice.get_env("board-a"),
        Err(ClientError::NotAcquired { .. })
    ));
}

#[tokio::test]
async fn acquired_place_is_usable_by_alias() {
    let coordinator = coordinator().await;
    let _exporter = FakeExporter::connect(&coordinator, "exp1", vec![serial("exp1", true)]).await;
    let alice = session(&coordinator, "host/alice").await;
    published(&alice, &serial("exp1", true).path, true).await;
    board(&alice, "board-a").await;
    alice.add_alias("board-a", "pi").await.unwrap();
    alice.acquire("board-a").await.unwrap();

    let env = alice.get_env("pi").unwrap();
    assert!(env.targets.contains_key("board-a"));
    assert!(alice.bind("pi").is_ok());
    assert!(matches!(
        alice.get_env("board"),
        Err(ClientError::UnknownPlace { .. })
    ));
}

#[tokio::test]
async fn console_of_acquired_place_reaches_the_serial_port() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let (mut rx, mut tx) = stream.split();
        tokio::io::copy(&mut rx, &mut tx).await.unwrap();
        tx.shutdown().await.unwrap();
    });

    let coordinator = coordinator().await;
    let mut console = serial("exp1", true);
    console.params = Params::from([
        ("host".to_string(), json!("127.0.0.1")),
        ("port".to_string(), json!(port)),
    ]);
    let _exporter = FakeExporter::connect(&coordinator, "exp1", vec![console.clone()]).await;
    let alice = session(&coordinator, "host/alice").await;
    published(&alice, &console.path, true).await;
    board(&alice, "board-a").await;

    assert!(matches!(
        alice.console("board-a"),
        Err(ClientError::NotAcquired { .. })
    ));
    alice.acquire("board-a").await.unwrap();
    let target = alice.console("board-a").unwrap();
    assert_eq!(target.resource, console.path);

    let (mut terminal, mut local) = tokio::io::duplex(64);
    let bridge = tokio::spawn(async move { crate::console::attach(&target, &mut local).await });
    terminal.write_all(b"uname\n").await.unwrap();
    terminal.shutdown().await.unwrap();
    let mut echoed = Vec::new();
    terminal.read_to_end(&mut echoed).await.unwrap();
    assert_eq!(echoed, b"uname\n");
    bridge.await.unwrap().unwrap();
}

#[tokio::test]
async fn second_acquire_fails_and_kick_releases() {
    let coordinator = coordinator().await;
    let _exporter = FakeExporter::connect(&coordinator, "exp1", vec![serial("exp1", true)]).await;
    let alice = session(&coordinator, "host/alice").await;
    let bob = session(&coordinator, "host/bob").await;
    published(&alice, &serial("exp1", true).path, true).await;
    board(&alice, "board-a").await;

    let (a, b) = tokio::join!(alice.acquire("board-a"), bob.acquire("board-a"));
    assert!(a.is_ok() != b.is_ok(), "exactly one acquire must win");
    let (winner, loser) = if a.is_ok() { (&alice, &bob) } else { (&bob, &alice) };

    let err = loser.release("board-a", false).await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected { kind: ErrorKind::User, .. }));

    loser.release("board-a", true).await.unwrap();
    assert!(winner.find_place("board-a").is_ok());
    winner
        .wait_for(WAIT, |s| {
            s.places.get("board-a").is_some_and(|p| p.acquired.is_none())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn binding_goes_stale_when_resource_disappears() {
    let coordinator = coordinator().await;
    let mut exporter =
        FakeExporter::connect(&coordinator, "exp1", vec![serial("exp1", true)]).await;
    let alice = session(&coordinator, "host/alice").await;
    published(&alice, &serial("exp1", true).path, true).await;
    board(&alice, "board-a").await;
    alice.acquire("board-a").await.unwrap();

    let mut bindings = alice.bind("board-a").unwrap();
    assert!(alice.resolve_conflicts(&mut bindings));

    let response = exporter
        .call(Request::UpsertResource {
            resource: serial("exp1", false),
        })
        .await;
    assert_eq!(response, Response::Ok);
    published(&alice, &serial("exp1", false).path, false).await;

    assert!(!alice.resolve_conflicts(&mut bindings));
    let err = bindings.env().unwrap_err();
    assert!(matches!(err, ClientError::StaleBinding { .. }));
    assert_eq!(err.category(), Category::Server);
}

#[tokio::test]
async fn reservation_waits_for_a_matching_place() {
    let coordinator = coordinator().await;
    let alice = session(&coordinator, "host/alice").await;
    let bob = session(&coordinator, "host/bob").await;

    let filters = BTreeMap::from([(
        "main".to_string(),
        TagFilter::from([("board".to_string(), "imx8".to_string())]),
    )]);
    let reservation = alice.create_reservation(filters, 0).await.unwrap();
    assert!(reservation.state.is_pending());
    assert_eq!(reservation.owner, "host/alice");
    assert!(alice.reservations().contains_key(&reservation.token));

    let token = reservation.token.clone();
    let waiter = alice.wait_reservation(&token);
    let provider = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        bob.add_place("imx-1").await.unwrap();
        bob.set_tags("imx-1", BTreeMap::from([("board".to_string(), "imx8".to_string())]))
            .await
            .unwrap();
    };
    let (allocated, ()) = tokio::time::timeout(WAIT, async { tokio::join!(waiter, provider) })
        .await
        .unwrap();
    let allocated = allocated.unwrap();
    assert_eq!(allocated.state, ReservationState::Allocated);
    assert_eq!(allocated.allocations["main"], vec!["imx-1".to_string()]);

    alice.cancel_reservation(&token).await.unwrap();
    assert!(!alice.reservations().contains_key(&token));
}

#[tokio::test]
async fn unreachable_coordinator_is_a_transport_error() {
    let coordinator = coordinator().await;
    let addr = coordinator.local_addr().to_string();
    coordinator.shutdown().await.unwrap();

    let options = SessionOptions::from_env().with_identity("host/alice");
    let err = match ClientSession::join(&addr, options).await {
        Err(e) => e,
        Ok(_) => panic!("join must fail after shutdown"),
    };
    assert_eq!(err.category(), Category::Transport);
}
