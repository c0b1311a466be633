use std::collections::BTreeMap;
use std::str::FromStr;

use crate::domain::{CardIndex, GamePhase, NightActionKind, PlayerId, PlayerRecord, RoleId};
use crate::messages::VoteTally;

/// Where the player's role came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSource {
    /// Decrypted from the reserved card.
    Card,
    /// Announced by the server's `role` message.
    Server,
}

/// Published on the dispatcher's broadcast bus. A subscriber sees events for
/// as long as it holds its receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    KeysReady {
        public_key: String,
    },
    LobbyUpdated {
        players: Vec<PlayerRecord>,
        my_id: Option<PlayerId>,
    },
    GameStarted {
        players: Vec<PlayerRecord>,
    },
    PhaseChanged {
        phase: GamePhase,
        round: u32,
    },
    ShuffleSubmitted {
        rows: usize,
    },
    CardsOpen {
        cards: usize,
    },
    CardRequested {
        card: CardIndex,
    },
    CardDenied {
        card: CardIndex,
    },
    CardReserved {
        card: CardIndex,
    },
    DecryptShared {
        requester: PlayerId,
        card: CardIndex,
    },
    RoleAssigned {
        role: RoleId,
        source: RoleSource,
    },
    NightActionSent {
        action: NightActionKind,
        target: PlayerId,
        proven: bool,
    },
    VoteSent {
        target: PlayerId,
    },
    PeekResult {
        target: PlayerId,
        role: RoleId,
    },
    NightEnded {
        killed: Option<PlayerId>,
    },
    VotesUpdated {
        votes: Vec<VoteTally>,
    },
    DayEnded {
        lynched: Option<PlayerId>,
    },
    GameOver {
        winner: String,
        roles: BTreeMap<PlayerId, String>,
    },
    /// A surfaced error. `fatal` errors are followed by the dispatcher stopping.
    ProtocolFailed {
        reason: String,
        fatal: bool,
    },
}

/// Local player input, standing in for the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    PickCard(CardIndex),
    NightAction {
        action: NightActionKind,
        target: PlayerId,
    },
    Vote {
        target: PlayerId,
    },
    SetReady(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("card index {0:?} is not a number")]
    BadIndex(String),
}

/// Line syntax: `pick <index>`, `peek <player>`, `kill <player>`,
/// `vote <player>`, `ready`, `unready`.
impl FromStr for PlayerCommand {
    type Err = CommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(CommandParseError::Empty)?;
        let mut arg = |name: &'static str| {
            words
                .next()
                .map(str::to_string)
                .ok_or(CommandParseError::MissingArgument(name))
        };
        match verb.to_ascii_lowercase().as_str() {
            "pick" => {
                let raw = arg("pick")?;
                let index = raw.parse().map_err(|_| CommandParseError::BadIndex(raw))?;
                Ok(PlayerCommand::PickCard(index))
            }
            "peek" => Ok(PlayerCommand::NightAction {
                action: NightActionKind::Peek,
                target: arg("peek")?,
            }),
            "kill" => Ok(PlayerCommand::NightAction {
                action: NightActionKind::Kill,
                target: arg("kill")?,
            }),
            "vote" => Ok(PlayerCommand::Vote {
                target: arg("vote")?,
            }),
            "ready" => Ok(PlayerCommand::SetReady(true)),
            "unready" => Ok(PlayerCommand::SetReady(false)),
            _ => Err(CommandParseError::Unknown(verb.to_string())),
        }
    }
}
