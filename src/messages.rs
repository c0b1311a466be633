//! Wire codec for the game server's invocation frames.
//!
//! Every frame is `{type, target, arguments}` with `type == 1` and a single
//! payload object (or bare value) in `arguments[0]`.

use std::collections::BTreeMap;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::{
    CardIndex, DecryptComponent, Deck, EncryptedCard, GamePhase, NightActionKind, PlayerId,
    PlayerRecord, RoleId, CIRCUIT_WIDTH,
};
use crate::reservation::ReservationStatus;

/// Frame type of an invocation.
pub const INVOCATION: u8 = 1;

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported frame type {0}")]
    UnsupportedFrame(u8),
    #[error("{0} frame has no payload")]
    MissingPayload(&'static str),
    #[error("bad {target} payload: {source}")]
    BadPayload {
        target: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub frame_type: u8,
    pub target: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
}

impl Envelope {
    pub fn invocation(target: impl Into<String>, payload: Value) -> Self {
        Self {
            frame_type: INVOCATION,
            target: target.into(),
            arguments: vec![payload],
        }
    }

    fn payload<T: DeserializeOwned>(&self, target: &'static str) -> Result<T, MessageError> {
        let raw = self
            .arguments
            .first()
            .cloned()
            .ok_or(MessageError::MissingPayload(target))?;
        serde_json::from_value(raw).map_err(|source| MessageError::BadPayload { target, source })
    }
}

// ---------- inbound payloads ----------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlayersPayload {
    pub players: Vec<PlayerRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PhasePayload {
    pub phase: GamePhase,
    pub round: u32,
    #[serde(default)]
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RolePayload {
    pub role: RoleId,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeekResultPayload {
    pub target: PlayerId,
    pub role: RoleId,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NightEndPayload {
    #[serde(default)]
    pub killed: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    #[serde(rename = "playerId")]
    pub player_id: PlayerId,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VoteUpdatePayload {
    pub votes: Vec<VoteTally>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DayEndPayload {
    #[serde(default)]
    pub lynched: Option<PlayerId>,
}

/// Final reveal. Role names are kept exactly as the server sent them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameOverPayload {
    pub winner: String,
    pub roles: BTreeMap<PlayerId, String>,
}

/// Decks must fit the circuit: between 1 and [`CIRCUIT_WIDTH`] rows.
fn circuit_deck<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Deck, D::Error> {
    let deck = Deck::deserialize(deserializer)?;
    if deck.is_empty() || deck.len() > CIRCUIT_WIDTH {
        return Err(D::Error::invalid_length(
            deck.len(),
            &"a deck of 1 to 10 encrypted cards",
        ));
    }
    Ok(deck)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartShufflePayload {
    pub agg_pk: String,
    #[serde(deserialize_with = "circuit_deck")]
    pub deck: Deck,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShuffleCompletePayload {
    #[serde(deserialize_with = "circuit_deck")]
    pub deck: Deck,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CardTakenPayload {
    pub status: ReservationStatus,
    pub card: CardIndex,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NeedDecryptPayload {
    #[serde(rename = "for")]
    pub requester: PlayerId,
    pub card: CardIndex,
    pub cipher: EncryptedCard,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PartialReadyPayload {
    pub card: CardIndex,
    pub partial: EncryptedCard,
    pub component: DecryptComponent,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AllPartsReadyPayload {
    pub card: CardIndex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Lobby(PlayersPayload),
    GameStart(PlayersPayload),
    Phase(PhasePayload),
    Role(RolePayload),
    PeekResult(PeekResultPayload),
    NightEnd(NightEndPayload),
    VoteUpdate(VoteUpdatePayload),
    DayEnd(DayEndPayload),
    GameOver(GameOverPayload),
    StartShuffle(StartShufflePayload),
    ShuffleComplete(ShuffleCompletePayload),
    CardTaken(CardTakenPayload),
    NeedDecrypt(NeedDecryptPayload),
    PartialReady(PartialReadyPayload),
    AllPartsReady(AllPartsReadyPayload),
    /// Target this schema version does not know.
    Unknown(String),
}

impl InboundMessage {
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        Self::from_envelope(&envelope)
    }

    pub fn from_envelope(envelope: &Envelope) -> Result<Self, MessageError> {
        if envelope.frame_type != INVOCATION {
            return Err(MessageError::UnsupportedFrame(envelope.frame_type));
        }
        let message = match envelope.target.as_str() {
            "lobby" => Self::Lobby(envelope.payload("lobby")?),
            "gameStart" => Self::GameStart(envelope.payload("gameStart")?),
            "phase" => Self::Phase(envelope.payload("phase")?),
            "role" => Self::Role(envelope.payload("role")?),
            "peekResult" => Self::PeekResult(envelope.payload("peekResult")?),
            "nightEnd" => Self::NightEnd(envelope.payload("nightEnd")?),
            "voteUpdate" => Self::VoteUpdate(envelope.payload("voteUpdate")?),
            "dayEnd" => Self::DayEnd(envelope.payload("dayEnd")?),
            "gameOver" => Self::GameOver(envelope.payload("gameOver")?),
            "startShuffle" => Self::StartShuffle(envelope.payload("startShuffle")?),
            "shuffleComplete" => Self::ShuffleComplete(envelope.payload("shuffleComplete")?),
            "cardTaken" => Self::CardTaken(envelope.payload("cardTaken")?),
            "needDecrypt" => Self::NeedDecrypt(envelope.payload("needDecrypt")?),
            "partialReady" => Self::PartialReady(envelope.payload("partialReady")?),
            "allPartsReady" => Self::AllPartsReady(envelope.payload("allPartsReady")?),
            other => Self::Unknown(other.to_string()),
        };
        Ok(message)
    }

    pub fn target(&self) -> &str {
        match self {
            Self::Lobby(_) => "lobby",
            Self::GameStart(_) => "gameStart",
            Self::Phase(_) => "phase",
            Self::Role(_) => "role",
            Self::PeekResult(_) => "peekResult",
            Self::NightEnd(_) => "nightEnd",
            Self::VoteUpdate(_) => "voteUpdate",
            Self::DayEnd(_) => "dayEnd",
            Self::GameOver(_) => "gameOver",
            Self::StartShuffle(_) => "startShuffle",
            Self::ShuffleComplete(_) => "shuffleComplete",
            Self::CardTaken(_) => "cardTaken",
            Self::NeedDecrypt(_) => "needDecrypt",
            Self::PartialReady(_) => "partialReady",
            Self::AllPartsReady(_) => "allPartsReady",
            Self::Unknown(target) => target,
        }
    }
}

// ---------- outbound payloads ----------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NightActionPayload {
    pub action: NightActionKind,
    pub target: PlayerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<Value>,
    #[serde(rename = "publicInputs", skip_serializing_if = "Option::is_none")]
    pub public_inputs: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecryptCardPayload {
    #[serde(rename = "for")]
    pub requester: PlayerId,
    pub card: CardIndex,
    pub partial: EncryptedCard,
    pub component: DecryptComponent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShuffleDonePayload {
    pub encrypted_deck: Deck,
    pub public_inputs: Value,
    pub proof: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Join { name: String },
    Ready(bool),
    RegisterPublicKey { public_key: String },
    PickCard { card: CardIndex },
    NightAction(NightActionPayload),
    Vote { target: PlayerId },
    DecryptCard(DecryptCardPayload),
    ShuffleDone(ShuffleDonePayload),
}

impl OutboundMessage {
    pub fn target(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Ready(_) => "ready",
            Self::RegisterPublicKey { .. } => "registerPublicKey",
            Self::PickCard { .. } => "pickCard",
            Self::NightAction(_) => "nightAction",
            Self::Vote { .. } => "vote",
            Self::DecryptCard(_) => "decryptCard",
            Self::ShuffleDone(_) => "shuffleDone",
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope, MessageError> {
        let payload = match self {
            Self::Join { name } => serde_json::json!({ "name": name }),
            Self::Ready(ready) => Value::Bool(*ready),
            Self::RegisterPublicKey { public_key } => {
                serde_json::json!({ "publicKey": public_key })
            }
            Self::PickCard { card } => serde_json::json!({ "card": card }),
            Self::NightAction(payload) => serde_json::to_value(payload)?,
            Self::Vote { target } => serde_json::json!({ "target": target }),
            Self::DecryptCard(payload) => serde_json::to_value(payload)?,
            Self::ShuffleDone(payload) => serde_json::to_value(payload)?,
        };
        Ok(Envelope::invocation(self.target(), payload))
    }

    pub fn to_text(&self) -> Result<String, MessageError> {
        Ok(serde_json::to_string(&self.to_envelope()?)?)
    }
}
