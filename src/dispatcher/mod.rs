//! Single event loop driving one player's side of the card protocol.
//!
//! Inbound frames, proof completions, player commands and the stop token are
//! multiplexed with `tokio::select!`. Proof calls run on spawned tasks and
//! report back tagged with the session epoch they were started under; a
//! completion whose epoch is no longer current is dropped.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::actions::{card_message_input, check_night_action, check_vote};
use crate::config::{CardPreference, DispatcherConfig};
use crate::decryption::{DecryptError, DecryptionOrchestrator, HelperRequest, HelperShare, RevealedCard};
use crate::domain::{CardIndex, Deck, GamePhase, NightActionKind, PlayerId};
use crate::keystore::KeyStore;
use crate::messages::{
    DecryptCardPayload, InboundMessage, NightActionPayload, OutboundMessage, ShuffleDonePayload,
};
use crate::prover::{CircuitOutput, CircuitRequest, ProofMode, ProverClient, ProverError};
use crate::reservation::{CardReservation, ReservationStep};
use crate::session::{
    CardPhase, CommandRejected, GameEvent, PlayerCommand, ProtocolError, RoleSource, Session,
};
use crate::shuffler::{ShuffleCoordinator, ShuffleError, ShuffleOutcome};
use crate::tokio_tools::spawn_cancellable;

#[cfg(test)]
mod tests;

const LOG_TARGET: &str = "werewolf::dispatcher";

/// Result of a spawned proof call.
#[derive(Debug)]
enum Completion {
    Shuffle(Result<ShuffleOutcome, ShuffleError>),
    Helper {
        requester: PlayerId,
        card: CardIndex,
        result: Result<HelperShare, DecryptError>,
    },
    Final {
        card: CardIndex,
        result: Result<RevealedCard, DecryptError>,
    },
    NightProof {
        action: NightActionKind,
        target: PlayerId,
        result: Result<CircuitOutput, ProverError>,
    },
}

#[derive(Debug)]
struct Tagged {
    epoch: u64,
    completion: Completion,
}

/// Channel ends the dispatcher talks through.
pub struct DispatcherChannels {
    /// Raw text frames from the transport. Closing it means the connection is gone.
    pub inbound: mpsc::Receiver<String>,
    pub outbound: mpsc::Sender<OutboundMessage>,
    pub commands: mpsc::Receiver<PlayerCommand>,
}

pub struct ProtocolDispatcher {
    cfg: DispatcherConfig,
    prover: Arc<dyn ProverClient>,
    session: Session,
    keys: Option<KeyStore>,
    reservation: CardReservation,
    decryption: DecryptionOrchestrator,
    preferred_card: Option<CardIndex>,
    inbound: mpsc::Receiver<String>,
    outbound: mpsc::Sender<OutboundMessage>,
    commands: mpsc::Receiver<PlayerCommand>,
    completions_tx: mpsc::Sender<Tagged>,
    completions_rx: mpsc::Receiver<Tagged>,
    events: broadcast::Sender<GameEvent>,
    rng: StdRng,
    stop: CancellationToken,
    tasks: CancellationToken,
}

impl ProtocolDispatcher {
    pub fn new(
        cfg: DispatcherConfig,
        prover: Arc<dyn ProverClient>,
        channels: DispatcherChannels,
        stop: CancellationToken,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::channel(cfg.completion_capacity);
        let (events, _) = broadcast::channel(cfg.event_capacity);
        let rng = match cfg.rng_seed {
            Some(seed) => StdRng::from_seed(seed),
            None => StdRng::from_entropy(),
        };
        let tasks = stop.child_token();
        Self {
            session: Session::new(cfg.player_name.clone()),
            cfg,
            prover,
            keys: None,
            reservation: CardReservation::new(),
            decryption: DecryptionOrchestrator::new(),
            preferred_card: None,
            inbound: channels.inbound,
            outbound: channels.outbound,
            commands: channels.commands,
            completions_tx,
            completions_rx,
            events,
            rng,
            stop,
            tasks,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run the bootstrap chain, then the event loop until stopped or a fatal error.
    pub async fn run(mut self) -> Result<(), ProtocolError> {
        let result = self.run_inner().await;
        self.session.bump_epoch();
        self.tasks.cancel();
        match &result {
            Ok(()) => info!(target = LOG_TARGET, "dispatcher stopped"),
            Err(err) => error!(target = LOG_TARGET, error = %err, "dispatcher stopped with error"),
        }
        result
    }

    async fn run_inner(&mut self) -> Result<(), ProtocolError> {
        let seed = KeyStore::fresh_seed(&mut self.rng);
        let prover = Arc::clone(&self.prover);
        let generator = self.cfg.generator.clone();
        let keygen = async move { KeyStore::generate(prover.as_ref(), &generator, seed).await };

        tokio::select! {
            biased;
            _ = self.stop.cancelled() => {
                debug!(target = LOG_TARGET, "stopped during bootstrap");
                return Ok(());
            }
            boot = keygen => {
                let keys = match boot {
                    Ok(keys) => keys,
                    Err(err) => return Err(self.surface(ProtocolError::KeyGen(err))),
                };
                if let Err(err) = self.install_keys(keys).await {
                    return Err(self.surface(err));
                }
            }
        }

        loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => {
                    debug!(target = LOG_TARGET, "shutdown signal received");
                    return Ok(());
                }
                Some(done) = self.completions_rx.recv() => {
                    self.on_completion(done).await?;
                }
                frame = self.inbound.recv() => match frame {
                    Some(text) => self.on_frame(&text).await?,
                    None => {
                        let err = ProtocolError::ConnectionLost("inbound stream closed".into());
                        return Err(self.surface(err));
                    }
                },
                Some(command) = self.commands.recv() => {
                    self.on_command(command).await?;
                }
            }
        }
    }

    /// join → registerPublicKey → ready.
    async fn install_keys(&mut self, keys: KeyStore) -> Result<(), ProtocolError> {
        let public_key = keys.public_key().to_string();
        self.keys = Some(keys);
        self.emit(GameEvent::KeysReady {
            public_key: public_key.clone(),
        });
        self.send(OutboundMessage::Join {
            name: self.cfg.player_name.clone(),
        })
        .await?;
        self.send(OutboundMessage::RegisterPublicKey { public_key }).await?;
        self.send(OutboundMessage::Ready(true)).await?;
        info!(target = LOG_TARGET, player = %self.cfg.player_name, "joined and ready");
        Ok(())
    }

    // ---------- plumbing ----------

    fn emit(&self, event: GameEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), ProtocolError> {
        debug!(target = LOG_TARGET, target_name = message.target(), "sending frame");
        self.outbound
            .send(message)
            .await
            .map_err(|_| ProtocolError::ConnectionLost("outbound channel closed".into()))
    }

    /// Log, publish and classify an error. Returns it for fatal propagation.
    fn surface(&mut self, err: ProtocolError) -> ProtocolError {
        let fatal = err.is_fatal();
        if err.aborts_card_protocol() && self.session.abort() {
            warn!(target = LOG_TARGET, "card protocol aborted");
        }
        if fatal {
            error!(target = LOG_TARGET, error = %err, "fatal protocol error");
        } else {
            warn!(target = LOG_TARGET, error = %err, "protocol error");
        }
        self.emit(GameEvent::ProtocolFailed {
            reason: err.to_string(),
            fatal,
        });
        err
    }

    /// Surface `err`, propagating only if it is fatal.
    fn recover(&mut self, err: ProtocolError) -> Result<(), ProtocolError> {
        let err = self.surface(err);
        if err.is_fatal() {
            Err(err)
        } else {
            Ok(())
        }
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = Completion> + Send + 'static,
    {
        let epoch = self.session.epoch();
        let tx = self.completions_tx.clone();
        spawn_cancellable(name.to_string(), self.tasks.clone(), async move {
            let completion = future.await;
            if tx.send(Tagged { epoch, completion }).await.is_err() {
                debug!(target = LOG_TARGET, "dispatcher gone, completion dropped");
            }
        });
    }

    fn keys(&self) -> Result<&KeyStore, ProtocolError> {
        self.keys.as_ref().ok_or(ProtocolError::KeysNotReady)
    }

    // ---------- inbound ----------

    async fn on_frame(&mut self, text: &str) -> Result<(), ProtocolError> {
        let message = match InboundMessage::parse(text) {
            Ok(message) => message,
            Err(err) => return self.recover(ProtocolError::Malformed(err)),
        };
        debug!(target = LOG_TARGET, target_name = message.target(), "inbound frame");
        match self.on_message(message).await {
            Ok(()) => Ok(()),
            Err(err) => self.recover(err),
        }
    }

    async fn on_message(&mut self, message: InboundMessage) -> Result<(), ProtocolError> {
        match message {
            InboundMessage::Lobby(payload) => {
                self.session.set_players(payload.players);
                self.emit(GameEvent::LobbyUpdated {
                    players: self.session.players.clone(),
                    my_id: self.session.my_id.clone(),
                });
            }
            InboundMessage::GameStart(payload) => {
                self.start_new_game();
                self.session.set_players(payload.players);
                self.emit(GameEvent::GameStarted {
                    players: self.session.players.clone(),
                });
            }
            InboundMessage::Phase(payload) => {
                if self.session.apply_phase(payload.phase, payload.round) {
                    info!(
                        target = LOG_TARGET,
                        phase = %payload.phase,
                        round = payload.round,
                        epoch = self.session.epoch(),
                        "phase changed"
                    );
                    self.emit(GameEvent::PhaseChanged {
                        phase: payload.phase,
                        round: payload.round,
                    });
                }
            }
            InboundMessage::Role(payload) => {
                if let Some(known) = self.session.my_role {
                    if known != payload.role {
                        warn!(
                            target = LOG_TARGET,
                            card_role = %known,
                            server_role = %payload.role,
                            "server role disagrees with decrypted card"
                        );
                    }
                }
                self.session.my_role = Some(payload.role);
                self.emit(GameEvent::RoleAssigned {
                    role: payload.role,
                    source: RoleSource::Server,
                });
            }
            InboundMessage::PeekResult(payload) => self.emit(GameEvent::PeekResult {
                target: payload.target,
                role: payload.role,
            }),
            InboundMessage::NightEnd(payload) => {
                if payload.killed.as_deref().is_some_and(|id| self.session.is_me(id)) {
                    info!(target = LOG_TARGET, "we were killed during the night");
                }
                self.emit(GameEvent::NightEnded {
                    killed: payload.killed,
                });
            }
            InboundMessage::VoteUpdate(payload) => {
                self.emit(GameEvent::VotesUpdated {
                    votes: payload.votes,
                });
            }
            InboundMessage::DayEnd(payload) => self.emit(GameEvent::DayEnded {
                lynched: payload.lynched,
            }),
            InboundMessage::GameOver(payload) => {
                let round = self.session.round;
                self.session.apply_phase(GamePhase::Over, round);
                self.emit(GameEvent::GameOver {
                    winner: payload.winner,
                    roles: payload.roles,
                });
                self.start_new_game();
            }
            InboundMessage::StartShuffle(payload) => {
                self.on_start_shuffle(payload.agg_pk, payload.deck)?;
            }
            InboundMessage::ShuffleComplete(payload) => {
                self.on_shuffle_complete(payload.deck).await?;
            }
            InboundMessage::CardTaken(payload) => {
                let step =
                    self.reservation
                        .on_response(&mut self.session.deck, payload.status, payload.card)?;
                self.on_reservation_step(step, Some(payload.card)).await?;
            }
            InboundMessage::NeedDecrypt(payload) => {
                self.on_need_decrypt(HelperRequest {
                    requester: payload.requester,
                    card: payload.card,
                    cipher: payload.cipher,
                })?;
            }
            InboundMessage::PartialReady(payload) => {
                self.decryption
                    .on_partial_ready(payload.card, payload.partial, payload.component);
                if self.session.deck.my_card() == Some(payload.card)
                    && self.session.card_phase() == CardPhase::CardReserved
                {
                    self.session.advance(CardPhase::AwaitingOwnDecrypt)?;
                }
            }
            InboundMessage::AllPartsReady(payload) => {
                self.on_all_parts_ready(payload.card)?;
            }
            InboundMessage::Unknown(target) => {
                debug!(target = LOG_TARGET, target_name = %target, "ignoring unknown target");
            }
        }
        Ok(())
    }

    /// Drop all card-protocol state so the next shuffle starts from `Idle`.
    fn start_new_game(&mut self) {
        self.session.reset_card_protocol();
        self.reservation.reset();
        self.decryption.reset();
        self.preferred_card = None;
        debug!(
            target = LOG_TARGET,
            epoch = self.session.epoch(),
            "card protocol reset for a new game"
        );
    }

    fn on_start_shuffle(
        &mut self,
        aggregate_public_key: String,
        deck: Deck,
    ) -> Result<(), ProtocolError> {
        self.keys()?;
        self.session.check_advance(CardPhase::ShuffleRequested)?;
        self.session.deck.replace(deck)?;
        self.session.advance(CardPhase::ShuffleRequested)?;
        let plan = ShuffleCoordinator::prepare(
            &mut self.rng,
            &self.cfg.generator,
            &aggregate_public_key,
            self.session.deck.cards(),
        )
        .map_err(ProtocolError::ShuffleFailed)?;

        info!(target = LOG_TARGET, rows = plan.real_rows(), "shuffle requested");
        let prover = Arc::clone(&self.prover);
        self.spawn("shuffle-proof", async move {
            Completion::Shuffle(ShuffleCoordinator::execute(prover.as_ref(), plan).await)
        });
        Ok(())
    }

    async fn on_shuffle_complete(&mut self, deck: Deck) -> Result<(), ProtocolError> {
        self.session.check_advance(CardPhase::CardsOpen)?;
        self.session.deck.replace(deck)?;
        self.session.advance(CardPhase::CardsOpen)?;
        self.reservation.reset();
        let cards = self.session.deck.len();
        info!(target = LOG_TARGET, cards, "deck open for reservation");
        self.emit(GameEvent::CardsOpen { cards });

        let preferred = match (self.cfg.card_preference, self.preferred_card.take()) {
            (_, Some(index)) => Some(index),
            (CardPreference::Random, None) => Some(self.rng.gen_range(0..cards)),
            (CardPreference::Manual, None) => None,
        };
        if let Some(index) = preferred {
            self.start_reservation(index).await?;
        }
        Ok(())
    }

    async fn start_reservation(&mut self, preferred: CardIndex) -> Result<(), ProtocolError> {
        let card = self.reservation.reserve(&self.session.deck, preferred)?;
        self.on_reservation_step(ReservationStep::Send(card), None).await
    }

    async fn on_reservation_step(
        &mut self,
        step: ReservationStep,
        denied: Option<CardIndex>,
    ) -> Result<(), ProtocolError> {
        match step {
            ReservationStep::Send(card) => {
                if let Some(denied) = denied {
                    self.emit(GameEvent::CardDenied { card: denied });
                }
                self.session.advance(CardPhase::ReservationPending)?;
                self.emit(GameEvent::CardRequested { card });
                self.send(OutboundMessage::PickCard { card }).await?;
            }
            ReservationStep::Reserved(card) => {
                self.session.advance(CardPhase::CardReserved)?;
                let cipher = self
                    .session
                    .deck
                    .card(card)
                    .cloned()
                    .ok_or(ProtocolError::Rejected(CommandRejected::NoOpenDeck))?;
                self.decryption
                    .on_reserved(card, cipher, self.session.my_id.clone());
                self.emit(GameEvent::CardReserved { card });
            }
            ReservationStep::Ignored => {}
        }
        Ok(())
    }

    fn on_need_decrypt(&mut self, request: HelperRequest) -> Result<(), ProtocolError> {
        let secret = self.keys()?.secret();
        if self.session.card_phase() == CardPhase::Aborted {
            debug!(target = LOG_TARGET, card = request.card, "card protocol aborted, not helping");
            return Ok(());
        }
        if !self.decryption.begin_help(&request) {
            return Ok(());
        }
        debug!(
            target = LOG_TARGET,
            requester = %request.requester,
            card = request.card,
            "removing our layer"
        );
        let prover = Arc::clone(&self.prover);
        let generator = self.cfg.generator.clone();
        self.spawn("helper-decrypt", async move {
            let requester = request.requester.clone();
            let card = request.card;
            let result =
                DecryptionOrchestrator::help(prover.as_ref(), &generator, secret, request).await;
            Completion::Helper {
                requester,
                card,
                result,
            }
        });
        Ok(())
    }

    fn on_all_parts_ready(&mut self, card: CardIndex) -> Result<(), ProtocolError> {
        if self.session.deck.my_card() != Some(card) {
            warn!(target = LOG_TARGET, card, "allPartsReady for a card that is not ours");
            return Ok(());
        }
        let pending = match self.decryption.take_for_final(card) {
            Ok(pending) => pending,
            Err(_) => {
                warn!(target = LOG_TARGET, card, "duplicate allPartsReady ignored");
                return Ok(());
            }
        };
        let secret = self.keys()?.secret();
        self.session.advance(CardPhase::AllPartsReady)?;
        self.session.advance(CardPhase::FinalDecrypting)?;
        info!(
            target = LOG_TARGET,
            card,
            components = pending.components.len(),
            "all partial decryptions received"
        );

        let prover = Arc::clone(&self.prover);
        let generator = self.cfg.generator.clone();
        self.spawn("final-decrypt", async move {
            let result =
                DecryptionOrchestrator::finalize(prover.as_ref(), &generator, secret, pending)
                    .await;
            Completion::Final { card, result }
        });
        Ok(())
    }

    // ---------- completions ----------

    async fn on_completion(&mut self, done: Tagged) -> Result<(), ProtocolError> {
        match self.apply_completion(done).await {
            Ok(()) => Ok(()),
            Err(err) => self.recover(err),
        }
    }

    async fn apply_completion(&mut self, done: Tagged) -> Result<(), ProtocolError> {
        if let Completion::Helper {
            requester, card, ..
        } = &done.completion
        {
            self.decryption.finish_help(requester, *card);
        }
        if !self.session.is_current(done.epoch) {
            debug!(
                target = LOG_TARGET,
                epoch = done.epoch,
                current = self.session.epoch(),
                "discarding stale proof completion"
            );
            if let Completion::Final { card, .. } = done.completion {
                warn!(target = LOG_TARGET, card, "own card decryption outlived its phase");
                self.emit(GameEvent::ProtocolFailed {
                    reason: format!("decryption of card {card} was discarded after a phase change"),
                    fatal: false,
                });
            }
            return Ok(());
        }

        match done.completion {
            Completion::Shuffle(Ok(outcome)) => {
                let rows = outcome.deck.len();
                self.session
                    .deck
                    .replace(outcome.deck.clone())
                    .map_err(|err| ProtocolError::ShuffleFailed(err.into()))?;
                self.send(OutboundMessage::ShuffleDone(ShuffleDonePayload {
                    encrypted_deck: outcome.deck,
                    public_inputs: outcome.public_inputs,
                    proof: outcome.proof,
                }))
                .await?;
                self.session.advance(CardPhase::ShuffleSubmitted)?;
                self.emit(GameEvent::ShuffleSubmitted { rows });
                Ok(())
            }
            Completion::Shuffle(Err(err)) => Err(ProtocolError::ShuffleFailed(err)),
            Completion::Helper {
                requester,
                card,
                result: Ok(share),
            } => {
                self.send(OutboundMessage::DecryptCard(DecryptCardPayload {
                    requester: share.requester,
                    card: share.card,
                    partial: share.partial,
                    component: share.component,
                }))
                .await?;
                self.emit(GameEvent::DecryptShared { requester, card });
                Ok(())
            }
            Completion::Helper {
                requester,
                card,
                result: Err(err),
            } => {
                // Helper failures drop only this request.
                warn!(
                    target = LOG_TARGET,
                    requester = %requester,
                    card,
                    error = %err,
                    "decrypt request dropped"
                );
                self.emit(GameEvent::ProtocolFailed {
                    reason: format!("decryption for {requester} card {card} failed: {err}"),
                    fatal: false,
                });
                Ok(())
            }
            Completion::Final {
                result: Ok(revealed),
                ..
            } => self.on_revealed(revealed),
            Completion::Final {
                card,
                result: Err(source),
            } => Err(ProtocolError::DecryptFailed { card, source }),
            Completion::NightProof {
                action,
                target,
                result,
            } => match result {
                Ok(output) => {
                    self.send_night_action(action, target, Some((output.proof, output.public_inputs)))
                        .await
                }
                Err(err) => Err(ProtocolError::NightProofFailed(err.to_string())),
            },
        }
    }

    fn on_revealed(&mut self, revealed: RevealedCard) -> Result<(), ProtocolError> {
        let card = revealed.card;
        let role = revealed.role();
        self.session.revealed = Some(revealed);
        match role {
            Ok(role) => {
                self.session.advance(CardPhase::RoleKnown)?;
                self.session.my_role = Some(role);
                info!(target = LOG_TARGET, card, role = %role, "role resolved from card");
                self.emit(GameEvent::RoleAssigned {
                    role,
                    source: RoleSource::Card,
                });
                Ok(())
            }
            Err(unresolved) => {
                self.session.advance(CardPhase::RoleUnresolved)?;
                Err(ProtocolError::Unresolved(unresolved))
            }
        }
    }

    // ---------- commands ----------

    async fn on_command(&mut self, command: PlayerCommand) -> Result<(), ProtocolError> {
        let result = match command {
            PlayerCommand::SetReady(ready) => self.send(OutboundMessage::Ready(ready)).await,
            PlayerCommand::PickCard(index) => self.on_pick_card(index).await,
            PlayerCommand::Vote { target } => match check_vote(&self.session, &target) {
                Ok(()) => {
                    self.send(OutboundMessage::Vote {
                        target: target.clone(),
                    })
                    .await?;
                    self.emit(GameEvent::VoteSent { target });
                    Ok(())
                }
                Err(rejected) => Err(rejected.into()),
            },
            PlayerCommand::NightAction { action, target } => {
                self.on_night_action(action, target).await
            }
        };
        match result {
            Ok(()) => Ok(()),
            Err(err) => self.recover(err),
        }
    }

    async fn on_pick_card(&mut self, index: CardIndex) -> Result<(), ProtocolError> {
        match self.session.card_phase() {
            CardPhase::CardsOpen => self.start_reservation(index).await,
            CardPhase::Idle | CardPhase::ShuffleRequested | CardPhase::ShuffleSubmitted => {
                debug!(target = LOG_TARGET, card = index, "deck not open yet, remembering pick");
                self.preferred_card = Some(index);
                Ok(())
            }
            _ => Err(CommandRejected::NoOpenDeck.into()),
        }
    }

    async fn on_night_action(
        &mut self,
        action: NightActionKind,
        target: PlayerId,
    ) -> Result<(), ProtocolError> {
        check_night_action(&self.session, action, &target)?;

        let revealed = match (&self.session.revealed, self.cfg.prove_night_actions) {
            (Some(revealed), true) => revealed,
            _ => return self.send_night_action(action, target, None).await,
        };
        let secret = self.keys()?.secret();
        let input = card_message_input(
            &self.session.deck,
            revealed,
            &[action.required_role()],
            secret,
        )
        .map_err(|err| ProtocolError::NightProofFailed(err.to_string()))?;
        let request = CircuitRequest::new(&input)
            .map_err(|err| ProtocolError::NightProofFailed(err.to_string()))?;

        debug!(target = LOG_TARGET, ?action, target_player = %target, "proving night action");
        let prover = Arc::clone(&self.prover);
        self.spawn("night-action-proof", async move {
            let result = prover.call(ProofMode::Prove, request).await;
            Completion::NightProof {
                action,
                target,
                result,
            }
        });
        Ok(())
    }

    async fn send_night_action(
        &self,
        action: NightActionKind,
        target: PlayerId,
        proof: Option<(Value, Value)>,
    ) -> Result<(), ProtocolError> {
        let proven = proof.is_some();
        let (proof, public_inputs) = match proof {
            Some((proof, public_inputs)) => (Some(proof), Some(public_inputs)),
            None => (None, None),
        };
        self.send(OutboundMessage::NightAction(NightActionPayload {
            action,
            target: target.clone(),
            proof,
            public_inputs,
        }))
        .await?;
        self.emit(GameEvent::NightActionSent {
            action,
            target,
            proven,
        });
        Ok(())
    }
}
