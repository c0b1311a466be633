use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::config::seed_to_array;
use crate::domain::{EncryptedCard, RoleId};
use crate::test_utils::{reversing_shuffle, ScriptedProver};

const WAIT: Duration = Duration::from_secs(5);
const SECRET: &str = "sk-secret-4242";

struct Harness {
    prover: Arc<ScriptedProver>,
    inbound: mpsc::Sender<String>,
    outbound: mpsc::Receiver<OutboundMessage>,
    commands: mpsc::Sender<PlayerCommand>,
    events: broadcast::Receiver<GameEvent>,
    stop: CancellationToken,
    handle: JoinHandle<Result<(), ProtocolError>>,
    sent: Vec<String>,
}

fn base_prover() -> ScriptedProver {
    ScriptedProver::new().respond("genElgamalKeyPair", json!({ "pk": "pk-alice", "sk": SECRET }))
}

fn manual_config() -> DispatcherConfig {
    DispatcherConfig::new("alice")
        .with_card_preference(CardPreference::Manual)
        .with_rng_seed(seed_to_array(17))
}

fn deck_json(n: usize) -> Value {
    Value::Array(
        (0..n)
            .map(|i| json!([format!("c1-{i}"), format!("c2-{i}")]))
            .collect(),
    )
}

fn frame(target: &str, payload: Value) -> String {
    json!({ "type": 1, "target": target, "arguments": [payload] }).to_string()
}

impl Harness {
    fn start(prover: ScriptedProver, cfg: DispatcherConfig) -> Self {
        let prover = Arc::new(prover);
        let (inbound_tx, inbound_rx) = mpsc::channel(32);
        let (outbound_tx, outbound_rx) = mpsc::channel(32);
        let (commands_tx, commands_rx) = mpsc::channel(8);
        let stop = CancellationToken::new();

        let dispatcher = ProtocolDispatcher::new(
            cfg,
            prover.clone() as Arc<dyn ProverClient>,
            DispatcherChannels {
                inbound: inbound_rx,
                outbound: outbound_tx,
                commands: commands_rx,
            },
            stop.clone(),
        );
        let events = dispatcher.subscribe();
        let handle = tokio::spawn(dispatcher.run());

        Self {
            prover,
            inbound: inbound_tx,
            outbound: outbound_rx,
            commands: commands_tx,
            events,
            stop,
            handle,
            sent: Vec::new(),
        }
    }

    async fn push(&self, target: &str, payload: Value) {
        self.inbound.send(frame(target, payload)).await.unwrap();
    }

    async fn command(&self, command: PlayerCommand) {
        self.commands.send(command).await.unwrap();
    }

    async fn next_out(&mut self) -> OutboundMessage {
        let message = timeout(WAIT, self.outbound.recv())
            .await
            .expect("timed out waiting for outbound frame")
            .expect("outbound channel closed");
        self.sent.push(message.to_text().unwrap());
        message
    }

    async fn wait_for<F>(&mut self, pred: F) -> GameEvent
    where
        F: Fn(&GameEvent) -> bool,
    {
        let events = &mut self.events;
        timeout(WAIT, async {
            loop {
                match events.recv().await {
                    Ok(event) if pred(&event) => return event,
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => panic!("event bus closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    /// Consume join, registerPublicKey and ready, then announce the lobby.
    async fn boot(&mut self) {
        assert_eq!(
            self.next_out().await,
            OutboundMessage::Join {
                name: "alice".into()
            }
        );
        assert_eq!(
            self.next_out().await,
            OutboundMessage::RegisterPublicKey {
                public_key: "pk-alice".into()
            }
        );
        assert_eq!(self.next_out().await, OutboundMessage::Ready(true));

        self.push(
            "lobby",
            json!({ "players": [
                { "id": "p1", "name": "alice", "ready": true },
                { "id": "p2", "name": "bob", "ready": true },
                { "id": "p3", "name": "carol", "ready": true },
                { "id": "p4", "name": "dave", "ready": true }
            ]}),
        )
        .await;
        self.wait_for(|e| matches!(e, GameEvent::LobbyUpdated { my_id: Some(_), .. }))
            .await;
    }

    /// Open a 4-card deck and reserve card 1.
    async fn reserve_card_one(&mut self) {
        self.command(PlayerCommand::PickCard(1)).await;
        self.push("shuffleComplete", json!({ "deck": deck_json(4) })).await;
        assert_eq!(self.next_out().await, OutboundMessage::PickCard { card: 1 });
        self.push("cardTaken", json!({ "status": "ok", "card": 1 })).await;
        self.wait_for(|e| *e == GameEvent::CardReserved { card: 1 }).await;
    }

    /// Prove the loop is idle: a ready toggle must be the very next frame.
    async fn assert_quiet(&mut self) {
        self.command(PlayerCommand::SetReady(false)).await;
        assert_eq!(self.next_out().await, OutboundMessage::Ready(false));
    }

    async fn shutdown(self) -> Result<(), ProtocolError> {
        self.stop.cancel();
        timeout(WAIT, self.handle)
            .await
            .expect("dispatcher did not stop")
            .unwrap()
    }
}

#[tokio::test]
async fn bootstrap_registers_key_and_joins() {
    let mut h = Harness::start(base_prover(), manual_config());
    h.boot().await;

    let keygen = h.prover.calls_to("genElgamalKeyPair");
    assert_eq!(keygen.len(), 1);
    assert_eq!(keygen[0].mode, ProofMode::Execute);
    assert_eq!(keygen[0].data["g"], json!("3"));
    assert!(h.shutdown().await.is_ok());
}

#[tokio::test]
async fn keygen_failure_ends_dispatcher() {
    let prover = ScriptedProver::new().fail("genElgamalKeyPair", 5);
    let h = Harness::start(prover, manual_config());
    let result = timeout(WAIT, h.handle).await.unwrap().unwrap();
    assert!(matches!(result, Err(ProtocolError::KeyGen(_))));
}

#[tokio::test]
async fn start_shuffle_sends_proven_deck() {
    let prover = base_prover().on("shuffle4", reversing_shuffle(4));
    let mut h = Harness::start(prover, manual_config());
    h.boot().await;

    h.push("startShuffle", json!({ "agg_pk": "agg-1", "deck": deck_json(4) }))
        .await;
    let OutboundMessage::ShuffleDone(done) = h.next_out().await else {
        panic!("expected shuffleDone");
    };
    let expected: Vec<EncryptedCard> = (0..4)
        .rev()
        .map(|i| EncryptedCard::new(format!("c1-{i}"), format!("c2-{i}")))
        .collect();
    assert_eq!(done.encrypted_deck, expected);
    assert_eq!(done.proof, json!("0xproof"));
    h.wait_for(|e| *e == GameEvent::ShuffleSubmitted { rows: 4 }).await;

    let call = &h.prover.calls_to("shuffle4")[0];
    assert_eq!(call.mode, ProofMode::Prove);
    assert_eq!(call.data["agg_pk"], json!("agg-1"));
    assert_eq!(call.data["deck"].as_array().unwrap().len(), 10);
    assert!(h.shutdown().await.is_ok());
}

#[tokio::test]
async fn shuffle_failure_aborts_without_retry() {
    let prover = base_prover().fail("shuffle4", 2);
    let mut h = Harness::start(prover, manual_config());
    h.boot().await;

    h.push("startShuffle", json!({ "agg_pk": "agg", "deck": deck_json(4) }))
        .await;
    h.wait_for(|e| matches!(e, GameEvent::ProtocolFailed { fatal: true, .. }))
        .await;
    let result = timeout(WAIT, h.handle).await.unwrap().unwrap();
    assert!(matches!(result, Err(ProtocolError::ShuffleFailed(_))));
    assert_eq!(h.prover.calls_to("shuffle4").len(), 1);
}

#[tokio::test]
async fn denied_card_is_retried_with_lowest_free_index() {
    let mut h = Harness::start(base_prover(), manual_config());
    h.boot().await;

    h.push("shuffleComplete", json!({ "deck": deck_json(4) })).await;
    h.wait_for(|e| *e == GameEvent::CardsOpen { cards: 4 }).await;
    h.command(PlayerCommand::PickCard(2)).await;
    assert_eq!(h.next_out().await, OutboundMessage::PickCard { card: 2 });

    h.push("cardTaken", json!({ "status": "denied", "card": 2 })).await;
    assert_eq!(h.next_out().await, OutboundMessage::PickCard { card: 0 });

    h.push("cardTaken", json!({ "status": "ok", "card": 0 })).await;
    h.wait_for(|e| *e == GameEvent::CardReserved { card: 0 }).await;
    assert!(h.shutdown().await.is_ok());
}

#[tokio::test]
async fn random_preference_picks_as_soon_as_deck_opens() {
    let cfg = DispatcherConfig::new("alice").with_rng_seed(seed_to_array(3));
    let mut h = Harness::start(base_prover(), cfg);
    h.boot().await;

    h.push("shuffleComplete", json!({ "deck": deck_json(5) })).await;
    let OutboundMessage::PickCard { card } = h.next_out().await else {
        panic!("expected pickCard");
    };
    assert!(card < 5);
    assert!(h.shutdown().await.is_ok());
}

#[tokio::test]
async fn exhausted_reservation_is_fatal() {
    let mut h = Harness::start(base_prover(), manual_config());
    h.boot().await;

    h.push("shuffleComplete", json!({ "deck": deck_json(1) })).await;
    h.command(PlayerCommand::PickCard(0)).await;
    assert_eq!(h.next_out().await, OutboundMessage::PickCard { card: 0 });
    h.push("cardTaken", json!({ "status": "denied", "card": 0 })).await;

    let result = timeout(WAIT, h.handle).await.unwrap().unwrap();
    assert!(matches!(
        result,
        Err(ProtocolError::Reservation(
            crate::reservation::ReservationError::Exhausted { attempts: 1 }
        ))
    ));
}

#[tokio::test]
async fn need_decrypt_answers_with_partial_and_component() {
    let prover = base_prover().respond("decryptOneLayer", json!(["comp-9", "c2-stripped"]));
    let mut h = Harness::start(prover, manual_config());
    h.boot().await;

    h.push(
        "needDecrypt",
        json!({ "for": "p3", "card": 2, "cipher": ["c1-2", "c2-2"] }),
    )
    .await;
    assert_eq!(
        h.next_out().await,
        OutboundMessage::DecryptCard(DecryptCardPayload {
            requester: "p3".into(),
            card: 2,
            partial: EncryptedCard::new("c1-2", "c2-stripped"),
            component: "comp-9".into(),
        })
    );
    let call = &h.prover.calls_to("decryptOneLayer")[0];
    assert_eq!(call.mode, ProofMode::Prove);
    assert_eq!(call.data["sk"], json!(SECRET));
    assert!(h.shutdown().await.is_ok());
}

#[tokio::test]
async fn duplicate_need_decrypt_is_served_once() {
    let mut prover = base_prover().respond("decryptOneLayer", json!(["k", "c2"]));
    let gate = prover.gate("decryptOneLayer");
    let mut h = Harness::start(prover, manual_config());
    h.boot().await;

    let request = json!({ "for": "p2", "card": 0, "cipher": ["a", "b"] });
    h.push("needDecrypt", request.clone()).await;
    h.push("needDecrypt", request).await;
    h.assert_quiet().await;
    gate.add_permits(2);

    assert!(matches!(h.next_out().await, OutboundMessage::DecryptCard(_)));
    h.assert_quiet().await;
    assert_eq!(h.prover.calls_to("decryptOneLayer").len(), 1);
    assert!(h.shutdown().await.is_ok());
}

#[tokio::test]
async fn owner_flow_resolves_role_from_own_card() {
    let prover = base_prover().respond("decryptOneLayer", json!(["own-comp", "0x01"]));
    let mut h = Harness::start(prover, manual_config());
    h.boot().await;
    h.reserve_card_one().await;

    h.push(
        "partialReady",
        json!({ "card": 1, "partial": ["c1-1", "x1"], "component": "k1" }),
    )
    .await;
    h.push(
        "partialReady",
        json!({ "card": 1, "partial": ["c1-1", "x2"], "component": "k2" }),
    )
    .await;
    h.push("allPartsReady", json!({ "card": 1 })).await;

    let event = h
        .wait_for(|e| matches!(e, GameEvent::RoleAssigned { .. }))
        .await;
    assert_eq!(
        event,
        GameEvent::RoleAssigned {
            role: RoleId::Seer,
            source: RoleSource::Card
        }
    );

    h.push("allPartsReady", json!({ "card": 1 })).await;
    h.assert_quiet().await;

    let calls = h.prover.calls_to("decryptOneLayer");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].mode, ProofMode::Execute);
    assert_eq!(calls[0].data["card"], json!(["c1-1", "x2"]));

    for text in &h.sent {
        assert!(!text.contains(SECRET), "secret leaked in {text}");
    }
    assert!(h.shutdown().await.is_ok());
}

#[tokio::test]
async fn unknown_role_code_is_surfaced_and_session_survives() {
    let prover = base_prover().respond("decryptOneLayer", json!(["own", "0x07"]));
    let mut h = Harness::start(prover, manual_config());
    h.boot().await;
    h.reserve_card_one().await;

    h.push("allPartsReady", json!({ "card": 1 })).await;
    let event = h
        .wait_for(|e| matches!(e, GameEvent::ProtocolFailed { .. }))
        .await;
    assert!(matches!(event, GameEvent::ProtocolFailed { fatal: false, .. }));

    h.push("role", json!({ "role": "Villager" })).await;
    h.wait_for(|e| {
        *e == GameEvent::RoleAssigned {
            role: RoleId::Villager,
            source: RoleSource::Server,
        }
    })
    .await;
    h.assert_quiet().await;
    assert!(h.shutdown().await.is_ok());
}

#[tokio::test]
async fn stale_shuffle_completion_is_discarded() {
    let mut prover = base_prover().on("shuffle4", reversing_shuffle(4));
    let gate = prover.gate("shuffle4");
    let mut h = Harness::start(prover, manual_config());
    h.boot().await;

    h.push("startShuffle", json!({ "agg_pk": "agg", "deck": deck_json(4) }))
        .await;
    h.push("phase", json!({ "phase": "night", "round": 1 })).await;
    h.wait_for(|e| matches!(e, GameEvent::PhaseChanged { .. }))
        .await;

    gate.add_permits(1);
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.assert_quiet().await;
    assert_eq!(h.prover.calls_to("shuffle4").len(), 1);
    assert!(h.shutdown().await.is_ok());
}

#[tokio::test]
async fn night_action_carries_card_proof_once_role_is_revealed() {
    let prover = base_prover()
        .respond("decryptOneLayer", json!(["own-comp", "0x01"]))
        .respond("verifyCardMessage", json!([]));
    let mut h = Harness::start(prover, manual_config());
    h.boot().await;
    h.reserve_card_one().await;
    h.push("allPartsReady", json!({ "card": 1 })).await;
    h.wait_for(|e| matches!(e, GameEvent::RoleAssigned { .. }))
        .await;

    h.push("phase", json!({ "phase": "night", "round": 1 })).await;
    h.wait_for(|e| matches!(e, GameEvent::PhaseChanged { .. }))
        .await;
    h.command(PlayerCommand::NightAction {
        action: NightActionKind::Peek,
        target: "p2".into(),
    })
    .await;

    assert_eq!(
        h.next_out().await,
        OutboundMessage::NightAction(NightActionPayload {
            action: NightActionKind::Peek,
            target: "p2".into(),
            proof: Some(json!("0xproof")),
            public_inputs: Some(json!(["0x01"])),
        })
    );
    let call = &h.prover.calls_to("verifyCardMessage")[0];
    assert_eq!(call.mode, ProofMode::Prove);
    assert_eq!(call.data["card"], json!("1"));
    assert_eq!(call.data["expected_messages"][0], json!("0x01"));
    assert_eq!(call.data["decrypt_components"][0], json!("own-comp"));
    assert!(h.shutdown().await.is_ok());
}

#[tokio::test]
async fn night_action_without_revealed_card_is_sent_plain() {
    let mut h = Harness::start(base_prover(), manual_config());
    h.boot().await;
    h.push("role", json!({ "role": "Werewolf" })).await;
    h.push("phase", json!({ "phase": "night", "round": 1 })).await;
    h.wait_for(|e| matches!(e, GameEvent::PhaseChanged { .. }))
        .await;

    h.command(PlayerCommand::NightAction {
        action: NightActionKind::Kill,
        target: "p3".into(),
    })
    .await;
    assert_eq!(
        h.next_out().await,
        OutboundMessage::NightAction(NightActionPayload {
            action: NightActionKind::Kill,
            target: "p3".into(),
            proof: None,
            public_inputs: None,
        })
    );
    assert!(h.shutdown().await.is_ok());
}

#[tokio::test]
async fn invalid_commands_are_rejected_locally() {
    let mut h = Harness::start(base_prover(), manual_config());
    h.boot().await;
    h.push("role", json!({ "role": "Seer" })).await;

    h.command(PlayerCommand::NightAction {
        action: NightActionKind::Peek,
        target: "p2".into(),
    })
    .await;
    h.wait_for(|e| matches!(e, GameEvent::ProtocolFailed { fatal: false, .. }))
        .await;

    h.push("phase", json!({ "phase": "day", "round": 1 })).await;
    h.command(PlayerCommand::Vote {
        target: "p1".into(),
    })
    .await;
    h.wait_for(|e| matches!(e, GameEvent::ProtocolFailed { fatal: false, .. }))
        .await;
    h.command(PlayerCommand::Vote {
        target: "p4".into(),
    })
    .await;
    assert_eq!(
        h.next_out().await,
        OutboundMessage::Vote {
            target: "p4".into()
        }
    );
    assert!(h.shutdown().await.is_ok());
}

#[tokio::test]
async fn malformed_frames_are_dropped() {
    let mut h = Harness::start(base_prover(), manual_config());
    h.boot().await;

    h.inbound.send("{not json".to_string()).await.unwrap();
    h.push("cardTaken", json!({ "status": "maybe", "card": 1 })).await;
    h.assert_quiet().await;
    assert!(h.shutdown().await.is_ok());
}

#[tokio::test]
async fn game_over_is_published_with_literal_roles() {
    let mut h = Harness::start(base_prover(), manual_config());
    h.boot().await;

    h.push(
        "gameOver",
        json!({ "winner": "wolves", "roles": { "p1": "WOLF", "p2": "SEER" } }),
    )
    .await;
    let GameEvent::GameOver { winner, roles } = h
        .wait_for(|e| matches!(e, GameEvent::GameOver { .. }))
        .await
    else {
        unreachable!();
    };
    assert_eq!(winner, "wolves");
    assert_eq!(roles.len(), 2);
    assert_eq!(roles["p1"], "WOLF");
    assert!(h.shutdown().await.is_ok());
}

#[tokio::test]
async fn closed_transport_is_connection_lost() {
    let mut h = Harness::start(base_prover(), manual_config());
    h.boot().await;

    let Harness { inbound, handle, .. } = h;
    drop(inbound);
    let result = timeout(WAIT, handle).await.unwrap().unwrap();
    assert!(matches!(result, Err(ProtocolError::ConnectionLost(_))));
}

#[tokio::test]
async fn unresolved_role_still_helps_other_players() {
    let prover = base_prover().respond("decryptOneLayer", json!(["k", "0x07"]));
    let mut h = Harness::start(prover, manual_config());
    h.boot().await;
    h.reserve_card_one().await;

    h.push("allPartsReady", json!({ "card": 1 })).await;
    h.wait_for(|e| matches!(e, GameEvent::ProtocolFailed { fatal: false, .. }))
        .await;

    h.push(
        "needDecrypt",
        json!({ "for": "p3", "card": 2, "cipher": ["c1-2", "c2-2"] }),
    )
    .await;
    let OutboundMessage::DecryptCard(share) = h.next_out().await else {
        panic!("expected decryptCard");
    };
    assert_eq!(share.requester, "p3");
    assert_eq!(share.card, 2);
    assert_eq!(h.prover.calls_to("decryptOneLayer").len(), 2);
    assert!(h.shutdown().await.is_ok());
}

#[tokio::test]
async fn decks_outside_circuit_width_are_dropped() {
    let prover = base_prover().on("shuffle4", reversing_shuffle(4));
    let mut h = Harness::start(prover, manual_config());
    h.boot().await;

    h.push("startShuffle", json!({ "agg_pk": "agg", "deck": [] })).await;
    h.wait_for(|e| matches!(e, GameEvent::ProtocolFailed { fatal: false, .. }))
        .await;
    h.push("shuffleComplete", json!({ "deck": deck_json(11) })).await;
    h.wait_for(|e| matches!(e, GameEvent::ProtocolFailed { fatal: false, .. }))
        .await;
    h.assert_quiet().await;
    assert!(h.prover.calls_to("shuffle4").is_empty());

    h.push("startShuffle", json!({ "agg_pk": "agg", "deck": deck_json(4) }))
        .await;
    assert!(matches!(h.next_out().await, OutboundMessage::ShuffleDone(_)));
    assert!(h.shutdown().await.is_ok());
}

#[tokio::test]
async fn game_over_resets_card_protocol_for_next_game() {
    let prover = base_prover()
        .respond("decryptOneLayer", json!(["own", "0x01"]))
        .on("shuffle4", reversing_shuffle(4));
    let mut h = Harness::start(prover, manual_config());
    h.boot().await;
    h.reserve_card_one().await;
    h.push("allPartsReady", json!({ "card": 1 })).await;
    h.wait_for(|e| matches!(e, GameEvent::RoleAssigned { .. }))
        .await;

    h.push("gameOver", json!({ "winner": "villagers", "roles": {} }))
        .await;
    h.wait_for(|e| matches!(e, GameEvent::GameOver { .. })).await;

    h.push("startShuffle", json!({ "agg_pk": "agg-2", "deck": deck_json(4) }))
        .await;
    assert!(matches!(h.next_out().await, OutboundMessage::ShuffleDone(_)));

    h.push("shuffleComplete", json!({ "deck": deck_json(4) })).await;
    h.command(PlayerCommand::PickCard(3)).await;
    assert_eq!(h.next_out().await, OutboundMessage::PickCard { card: 3 });
    assert!(h.shutdown().await.is_ok());
}

#[tokio::test]
async fn stale_final_decrypt_is_discarded_and_reported() {
    let mut prover = base_prover().respond("decryptOneLayer", json!(["own", "0x01"]));
    let gate = prover.gate("decryptOneLayer");
    let mut h = Harness::start(prover, manual_config());
    h.boot().await;
    h.reserve_card_one().await;

    h.push("allPartsReady", json!({ "card": 1 })).await;
    h.push("phase", json!({ "phase": "night", "round": 1 })).await;
    h.wait_for(|e| matches!(e, GameEvent::PhaseChanged { .. }))
        .await;
    gate.add_permits(1);

    let event = h
        .wait_for(|e| {
            matches!(
                e,
                GameEvent::ProtocolFailed { .. } | GameEvent::RoleAssigned { .. }
            )
        })
        .await;
    assert!(matches!(event, GameEvent::ProtocolFailed { fatal: false, .. }));
    h.assert_quiet().await;
    assert!(h.shutdown().await.is_ok());
}

#[tokio::test]
async fn stale_helper_share_is_not_sent() {
    let mut prover = base_prover().respond("decryptOneLayer", json!(["k", "c2"]));
    let gate = prover.gate("decryptOneLayer");
    let mut h = Harness::start(prover, manual_config());
    h.boot().await;

    let request = json!({ "for": "p2", "card": 0, "cipher": ["a", "b"] });
    h.push("needDecrypt", request.clone()).await;
    h.push("phase", json!({ "phase": "day", "round": 1 })).await;
    h.wait_for(|e| matches!(e, GameEvent::PhaseChanged { .. }))
        .await;
    gate.add_permits(1);
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.assert_quiet().await;

    // The in-flight slot was released, so a repeated request is served.
    gate.add_permits(1);
    h.push("needDecrypt", request).await;
    assert!(matches!(h.next_out().await, OutboundMessage::DecryptCard(_)));
    assert_eq!(h.prover.calls_to("decryptOneLayer").len(), 2);
    assert!(h.shutdown().await.is_ok());
}
