use thiserror::Error;

use crate::deck::DeckError;
use crate::decryption::DecryptError;
use crate::domain::{CardIndex, GamePhase, NightActionKind, RoleId, UnresolvedRole};
use crate::keystore::KeyGenError;
use crate::messages::MessageError;
use crate::reservation::ReservationError;
use crate::shuffler::ShuffleError;

use super::CardPhase;

/// Player commands refused before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandRejected {
    #[error("{action:?} is only allowed at night, current phase is {phase}")]
    NotNight {
        action: NightActionKind,
        phase: GamePhase,
    },
    #[error("voting is only allowed during the day, current phase is {0}")]
    NotDay(GamePhase),
    #[error("cannot target yourself")]
    SelfTarget,
    #[error("{action:?} requires role {required}, known role is {known:?}")]
    RoleNotAllowed {
        action: NightActionKind,
        required: RoleId,
        known: Option<RoleId>,
    },
    #[error("no card deck is open")]
    NoOpenDeck,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("malformed inbound message: {0}")]
    Malformed(#[from] MessageError),
    #[error("session keys unavailable: {0}")]
    KeyGen(#[from] KeyGenError),
    #[error("shuffle failed: {0}")]
    ShuffleFailed(#[source] ShuffleError),
    #[error("decryption of card {card} failed: {source}")]
    DecryptFailed {
        card: CardIndex,
        #[source]
        source: DecryptError,
    },
    #[error("deck update refused: {0}")]
    Deck(#[from] DeckError),
    #[error("card reservation failed: {0}")]
    Reservation(#[from] ReservationError),
    #[error("role unresolved: {0}")]
    Unresolved(#[from] UnresolvedRole),
    #[error("card protocol cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: CardPhase, to: CardPhase },
    #[error("night action proof failed: {0}")]
    NightProofFailed(String),
    #[error("command rejected: {0}")]
    Rejected(#[from] CommandRejected),
    #[error("session keys are not ready")]
    KeysNotReady,
}

impl ProtocolError {
    /// Fatal errors end the dispatcher.
    pub fn is_fatal(&self) -> bool {
        match self {
            ProtocolError::ConnectionLost(_)
            | ProtocolError::KeyGen(_)
            | ProtocolError::ShuffleFailed(_)
            | ProtocolError::DecryptFailed { .. } => true,
            ProtocolError::Reservation(err) => matches!(err, ReservationError::Exhausted { .. }),
            _ => false,
        }
    }

    /// Errors that move the card protocol to `Aborted`.
    pub fn aborts_card_protocol(&self) -> bool {
        matches!(
            self,
            ProtocolError::ShuffleFailed(_)
                | ProtocolError::DecryptFailed { .. }
                | ProtocolError::Reservation(ReservationError::Exhausted { .. })
        )
    }
}
