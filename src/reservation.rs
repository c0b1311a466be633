use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::deck::{DeckError, DeckState};
use crate::domain::CardIndex;

const LOG_TARGET: &str = "werewolf::reservation";

/// Server verdict carried by `cardTaken`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Ok,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReservationError {
    #[error("every card index was rejected after {attempts} attempts")]
    Exhausted { attempts: usize },
    #[error("no deck is open for reservation")]
    NoDeck,
    #[error("reservation for card {0} is still pending")]
    AlreadyPending(CardIndex),
    #[error("card {0} is already reserved")]
    AlreadyReserved(CardIndex),
    #[error(transparent)]
    Deck(#[from] DeckError),
}

/// What the caller must do after a reservation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationStep {
    /// Send `pickCard{card}`.
    Send(CardIndex),
    /// The server accepted this index.
    Reserved(CardIndex),
    /// Response did not match the in-flight request.
    Ignored,
}

/// Serialized pick/retry loop. At most one request is in flight.
#[derive(Debug, Clone, Default)]
pub struct CardReservation {
    in_flight: Option<CardIndex>,
    attempts: usize,
}

impl CardReservation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> Option<CardIndex> {
        self.in_flight
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Start reserving `preferred`, or the lowest free index if `preferred`
    /// is rejected or out of range.
    pub fn reserve(
        &mut self,
        deck: &DeckState,
        preferred: CardIndex,
    ) -> Result<CardIndex, ReservationError> {
        if let Some(pending) = self.in_flight {
            return Err(ReservationError::AlreadyPending(pending));
        }
        if let Some(mine) = deck.my_card() {
            return Err(ReservationError::AlreadyReserved(mine));
        }
        if deck.is_empty() {
            return Err(ReservationError::NoDeck);
        }

        let index = if deck.is_available(preferred) {
            preferred
        } else {
            deck.lowest_available().ok_or(ReservationError::Exhausted {
                attempts: self.attempts,
            })?
        };
        self.start(index);
        Ok(index)
    }

    pub fn on_response(
        &mut self,
        deck: &mut DeckState,
        status: ReservationStatus,
        card: CardIndex,
    ) -> Result<ReservationStep, ReservationError> {
        if self.in_flight != Some(card) {
            warn!(
                target = LOG_TARGET,
                card,
                in_flight = ?self.in_flight,
                "dropping cardTaken for a card we are not reserving"
            );
            return Ok(ReservationStep::Ignored);
        }
        self.in_flight = None;

        match status {
            ReservationStatus::Ok => {
                deck.assign(card)?;
                info!(target = LOG_TARGET, card, attempts = self.attempts, "card reserved");
                Ok(ReservationStep::Reserved(card))
            }
            ReservationStatus::Denied => {
                deck.reject(card);
                let next = deck.lowest_available().ok_or(ReservationError::Exhausted {
                    attempts: self.attempts,
                })?;
                debug!(target = LOG_TARGET, denied = card, next, "card taken, retrying");
                self.start(next);
                Ok(ReservationStep::Send(next))
            }
        }
    }

    pub fn reset(&mut self) {
        self.in_flight = None;
        self.attempts = 0;
    }

    fn start(&mut self, index: CardIndex) {
        self.in_flight = Some(index);
        self.attempts += 1;
    }
}
