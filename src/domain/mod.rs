//! Core domain types shared by the card protocol components.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub mod roles;

pub use roles::*;

// ---------- Common type aliases ----------
pub type PlayerId = String;
/// Field element as produced and consumed by the proving service (decimal or hex string).
pub type FieldElement = String;
pub type DecryptComponent = String;
pub type CardIndex = usize;

/// Width of every deck-shaped circuit input.
pub const CIRCUIT_WIDTH: usize = 10;

/// Value used for padding rows and unused circuit slots.
pub const NEUTRAL_ELEMENT: &str = "0";

/// ElGamal ciphertext `(c1, c2)`, serialized as a two-element array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncryptedCard(pub FieldElement, pub FieldElement);

impl EncryptedCard {
    pub fn new(c1: impl Into<FieldElement>, c2: impl Into<FieldElement>) -> Self {
        Self(c1.into(), c2.into())
    }

    /// Neutral ciphertext used to pad decks up to [`CIRCUIT_WIDTH`].
    pub fn neutral() -> Self {
        Self(NEUTRAL_ELEMENT.to_string(), NEUTRAL_ELEMENT.to_string())
    }

    pub fn c1(&self) -> &str {
        &self.0
    }

    pub fn c2(&self) -> &str {
        &self.1
    }
}

pub type Deck = Vec<EncryptedCard>;

// ---------- Players ----------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub ready: bool,
}

/// Game phase as announced by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    Lobby,
    Night,
    Day,
    Over,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GamePhase::Lobby => "lobby",
            GamePhase::Night => "night",
            GamePhase::Day => "day",
            GamePhase::Over => "over",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NightActionKind {
    Peek,
    Kill,
}

impl NightActionKind {
    /// Role that is allowed to perform this action.
    pub fn required_role(self) -> RoleId {
        match self {
            NightActionKind::Peek => RoleId::Seer,
            NightActionKind::Kill => RoleId::Wolf,
        }
    }
}

// ---------- Keys ----------

/// ElGamal secret key. Zeroized on drop and never serialized.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(String);

impl SecretKey {
    pub(crate) fn new(value: String) -> Self {
        Self(value)
    }

    /// Raw field element, only for building circuit inputs.
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public_key: FieldElement,
    pub secret_key: SecretKey,
}
