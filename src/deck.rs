use std::collections::BTreeSet;

use crate::domain::{CardIndex, Deck, EncryptedCard, CIRCUIT_WIDTH};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeckError {
    #[error("deck must hold between 1 and 10 cards, got {0}")]
    BadSize(usize),
    #[error("deck is frozen once a card is reserved")]
    Frozen,
    #[error("card index {index} is outside a deck of {len}")]
    OutOfRange { index: CardIndex, len: usize },
}

/// Right-pad a deck with neutral ciphertexts up to [`CIRCUIT_WIDTH`].
pub fn pad_deck(deck: &[EncryptedCard]) -> Result<Deck, DeckError> {
    if deck.is_empty() || deck.len() > CIRCUIT_WIDTH {
        return Err(DeckError::BadSize(deck.len()));
    }
    let mut padded = Vec::with_capacity(CIRCUIT_WIDTH);
    padded.extend_from_slice(deck);
    padded.resize(CIRCUIT_WIDTH, EncryptedCard::neutral());
    Ok(padded)
}

/// Current encrypted deck plus this player's reservation bookkeeping.
///
/// The deck holds only real rows; padding exists only at circuit submission.
#[derive(Debug, Clone, Default)]
pub struct DeckState {
    deck: Deck,
    my_card: Option<CardIndex>,
    rejected: BTreeSet<CardIndex>,
}

impl DeckState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cards(&self) -> &[EncryptedCard] {
        &self.deck
    }

    pub fn len(&self) -> usize {
        self.deck.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deck.is_empty()
    }

    pub fn card(&self, index: CardIndex) -> Option<&EncryptedCard> {
        self.deck.get(index)
    }

    pub fn padded(&self) -> Result<Deck, DeckError> {
        pad_deck(&self.deck)
    }

    pub fn is_frozen(&self) -> bool {
        self.my_card.is_some()
    }

    /// Replace the deck wholesale after a shuffle step.
    pub fn replace(&mut self, deck: Deck) -> Result<(), DeckError> {
        if self.is_frozen() {
            return Err(DeckError::Frozen);
        }
        if deck.is_empty() || deck.len() > CIRCUIT_WIDTH {
            return Err(DeckError::BadSize(deck.len()));
        }
        self.deck = deck;
        self.rejected.clear();
        Ok(())
    }

    pub fn my_card(&self) -> Option<CardIndex> {
        self.my_card
    }

    pub fn assign(&mut self, index: CardIndex) -> Result<(), DeckError> {
        if index >= self.deck.len() {
            return Err(DeckError::OutOfRange {
                index,
                len: self.deck.len(),
            });
        }
        self.my_card = Some(index);
        Ok(())
    }

    pub fn rejected(&self) -> &BTreeSet<CardIndex> {
        &self.rejected
    }

    /// Returns `false` if the index was already rejected.
    pub fn reject(&mut self, index: CardIndex) -> bool {
        self.rejected.insert(index)
    }

    pub fn is_available(&self, index: CardIndex) -> bool {
        index < self.deck.len() && !self.rejected.contains(&index)
    }

    pub fn lowest_available(&self) -> Option<CardIndex> {
        (0..self.deck.len()).find(|index| !self.rejected.contains(index))
    }

    /// Forget everything; used when a new round starts.
    pub fn reset(&mut self) {
        self.deck.clear();
        self.my_card = None;
        self.rejected.clear();
    }
}
