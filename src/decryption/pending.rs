use std::collections::HashMap;

use crate::domain::{CardIndex, DecryptComponent, EncryptedCard, PlayerId};

/// Partial-decryption progress for one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDecryption {
    pub card: CardIndex,
    /// Ciphertext with every layer received so far removed.
    pub cipher: EncryptedCard,
    /// Helper shares in arrival order.
    pub components: Vec<DecryptComponent>,
    pub requester: Option<PlayerId>,
}

impl PendingDecryption {
    pub fn new(card: CardIndex, cipher: EncryptedCard) -> Self {
        Self {
            card,
            cipher,
            components: Vec::new(),
            requester: None,
        }
    }
}

/// Pending decryptions keyed by card index.
#[derive(Debug, Clone, Default)]
pub struct PendingDecryptions {
    entries: HashMap<CardIndex, PendingDecryption>,
}

impl PendingDecryptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an entry for a freshly reserved card. An existing entry wins,
    /// since helper partials may already have replaced its cipher.
    pub fn open(&mut self, card: CardIndex, cipher: EncryptedCard, requester: Option<PlayerId>) {
        let entry = self
            .entries
            .entry(card)
            .or_insert_with(|| PendingDecryption::new(card, cipher));
        if entry.requester.is_none() {
            entry.requester = requester;
        }
    }

    /// Record a helper's share: the partial replaces the cipher and the
    /// component is appended.
    pub fn record_partial(
        &mut self,
        card: CardIndex,
        partial: EncryptedCard,
        component: DecryptComponent,
    ) -> usize {
        let entry = self
            .entries
            .entry(card)
            .or_insert_with(|| PendingDecryption::new(card, partial.clone()));
        entry.cipher = partial;
        entry.components.push(component);
        entry.components.len()
    }

    pub fn get(&self, card: CardIndex) -> Option<&PendingDecryption> {
        self.entries.get(&card)
    }

    /// Remove and return the entry. A second call for the same card yields `None`.
    pub fn take(&mut self, card: CardIndex) -> Option<PendingDecryption> {
        self.entries.remove(&card)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
