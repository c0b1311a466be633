//! Per-connection session context owned by the dispatcher.

use crate::deck::DeckState;
use crate::decryption::RevealedCard;
use crate::domain::{GamePhase, PlayerId, PlayerRecord, RoleId};

mod error;
mod events;

pub use error::{CommandRejected, ProtocolError};
pub use events::{CommandParseError, GameEvent, PlayerCommand, RoleSource};

/// One round of the card protocol from this player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardPhase {
    Idle,
    ShuffleRequested,
    ShuffleSubmitted,
    CardsOpen,
    ReservationPending,
    CardReserved,
    AwaitingOwnDecrypt,
    AllPartsReady,
    FinalDecrypting,
    RoleKnown,
    /// Own card decrypted to an unknown code. Helping others continues.
    RoleUnresolved,
    Aborted,
}

impl CardPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, CardPhase::RoleKnown | CardPhase::Aborted)
    }

    /// Whether `self -> next` is a legal step.
    pub fn can_advance_to(self, next: CardPhase) -> bool {
        use CardPhase::*;
        if next == Aborted {
            return !self.is_terminal();
        }
        match next {
            ShuffleRequested => matches!(self, Idle | ShuffleSubmitted),
            ShuffleSubmitted => self == ShuffleRequested,
            CardsOpen => matches!(self, Idle | ShuffleRequested | ShuffleSubmitted),
            ReservationPending => matches!(self, CardsOpen | ReservationPending),
            CardReserved => self == ReservationPending,
            AwaitingOwnDecrypt => self == CardReserved,
            AllPartsReady => matches!(self, CardReserved | AwaitingOwnDecrypt),
            FinalDecrypting => self == AllPartsReady,
            RoleKnown => self == FinalDecrypting,
            RoleUnresolved => self == FinalDecrypting,
            Idle | Aborted => false,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    pub my_name: String,
    pub my_id: Option<PlayerId>,
    pub phase: GamePhase,
    pub round: u32,
    pub players: Vec<PlayerRecord>,
    pub deck: DeckState,
    pub my_role: Option<RoleId>,
    /// Own card after final decryption, kept for night-action proofs.
    pub revealed: Option<RevealedCard>,
    card_phase: CardPhase,
    epoch: u64,
}

impl Session {
    pub fn new(my_name: impl Into<String>) -> Self {
        Self {
            my_name: my_name.into(),
            my_id: None,
            phase: GamePhase::Lobby,
            round: 0,
            players: Vec::new(),
            deck: DeckState::new(),
            my_role: None,
            revealed: None,
            card_phase: CardPhase::Idle,
            epoch: 0,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    /// Invalidate every outstanding proof call.
    pub fn bump_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    pub fn card_phase(&self) -> CardPhase {
        self.card_phase
    }

    /// Fail with `InvalidTransition` unless `next` is legal, without moving.
    pub fn check_advance(&self, next: CardPhase) -> Result<(), ProtocolError> {
        if !self.card_phase.can_advance_to(next) {
            return Err(ProtocolError::InvalidTransition {
                from: self.card_phase,
                to: next,
            });
        }
        Ok(())
    }

    pub fn advance(&mut self, next: CardPhase) -> Result<(), ProtocolError> {
        self.check_advance(next)?;
        self.card_phase = next;
        Ok(())
    }

    /// Start the card protocol over for a new game. Invalidates outstanding proofs.
    pub fn reset_card_protocol(&mut self) {
        self.card_phase = CardPhase::Idle;
        self.deck.reset();
        self.my_role = None;
        self.revealed = None;
        self.bump_epoch();
    }

    /// Move to `Aborted` unless already terminal.
    pub fn abort(&mut self) -> bool {
        if self.card_phase.is_terminal() {
            return false;
        }
        self.card_phase = CardPhase::Aborted;
        true
    }

    /// Replace the roster and resolve our id from our name.
    pub fn set_players(&mut self, players: Vec<PlayerRecord>) {
        if let Some(me) = players.iter().find(|p| p.name == self.my_name) {
            self.my_id = Some(me.id.clone());
        }
        self.players = players;
    }

    /// Apply a `phase` message. Returns `true` and bumps the epoch on change.
    pub fn apply_phase(&mut self, phase: GamePhase, round: u32) -> bool {
        if self.phase == phase && self.round == round {
            return false;
        }
        self.phase = phase;
        self.round = round;
        self.bump_epoch();
        true
    }

    pub fn is_me(&self, player: &str) -> bool {
        self.my_id.as_deref() == Some(player)
    }
}
