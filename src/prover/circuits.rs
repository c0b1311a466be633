//! Typed inputs and outputs of the circuits the client drives.
//!
//! Every scalar travels as a string field element, matching what the
//! proving service expects.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};

use crate::domain::{EncryptedCard, FieldElement, SecretKey};

pub trait Circuit: Serialize {
    const NAME: &'static str;
}

fn expose_secret<S: Serializer>(secret: &Arc<SecretKey>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose())
}

/// `genElgamalKeyPair{g, r}`
#[derive(Debug, Clone, Serialize)]
pub struct GenKeyPairInput {
    pub g: FieldElement,
    pub r: FieldElement,
}

impl Circuit for GenKeyPairInput {
    const NAME: &'static str = "genElgamalKeyPair";
}

#[derive(Deserialize)]
pub struct KeyPairOutputs {
    pub pk: FieldElement,
    pub sk: FieldElement,
}

impl fmt::Debug for KeyPairOutputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPairOutputs")
            .field("pk", &self.pk)
            .field("sk", &"<redacted>")
            .finish()
    }
}

/// `shuffle4{g, agg_pk, deck, rand, perm}`; all rows padded to the circuit width.
#[derive(Debug, Clone, Serialize)]
pub struct ShuffleInput {
    pub g: FieldElement,
    pub agg_pk: FieldElement,
    pub deck: Vec<EncryptedCard>,
    pub rand: Vec<FieldElement>,
    pub perm: Vec<Vec<String>>,
}

impl Circuit for ShuffleInput {
    const NAME: &'static str = "shuffle4";
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShuffleOutputs {
    #[serde(rename = "shuffledDeck")]
    pub shuffled_deck: Vec<EncryptedCard>,
}

/// `decryptOneLayer{g, card, sk}`
#[derive(Clone, Serialize)]
pub struct DecryptOneLayerInput {
    pub g: FieldElement,
    pub card: EncryptedCard,
    #[serde(serialize_with = "expose_secret")]
    pub sk: Arc<SecretKey>,
}

impl Circuit for DecryptOneLayerInput {
    const NAME: &'static str = "decryptOneLayer";
}

impl fmt::Debug for DecryptOneLayerInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptOneLayerInput")
            .field("g", &self.g)
            .field("card", &self.card)
            .field("sk", &self.sk)
            .finish()
    }
}

/// Two-element output of `decryptOneLayer`.
///
/// Element 0 is the decrypt component for this layer, element 1 the
/// remaining `c2` (the plaintext message once the last layer is removed).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DecryptOutputs(pub FieldElement, pub FieldElement);

/// `verifyCardMessage{...}`: proves the revealed card decrypts to one of the
/// expected messages without revealing which one.
#[derive(Clone, Serialize)]
pub struct VerifyCardMessageInput {
    pub deck: Vec<EncryptedCard>,
    pub deck_size: String,
    pub card: String,
    pub decrypt_components: Vec<FieldElement>,
    pub num_decrypt_components: String,
    pub expected_messages: Vec<FieldElement>,
    pub num_expected_messages: String,
    #[serde(serialize_with = "expose_secret")]
    pub nullifier_secret: Arc<SecretKey>,
}

impl Circuit for VerifyCardMessageInput {
    const NAME: &'static str = "verifyCardMessage";
}

impl fmt::Debug for VerifyCardMessageInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyCardMessageInput")
            .field("deck_size", &self.deck_size)
            .field("card", &self.card)
            .field("num_decrypt_components", &self.num_decrypt_components)
            .field("num_expected_messages", &self.num_expected_messages)
            .finish_non_exhaustive()
    }
}
