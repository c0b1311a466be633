use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Role a player holds for the whole game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleId {
    Wolf,
    Seer,
    Villager,
}

/// Byte code → role. Fixed at compile time.
pub const ROLE_TABLE: [(u8, RoleId); 3] = [
    (0x00, RoleId::Wolf),
    (0x01, RoleId::Seer),
    (0x02, RoleId::Villager),
];

impl RoleId {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleId::Wolf => "WOLF",
            RoleId::Seer => "SEER",
            RoleId::Villager => "VILLAGER",
        }
    }

    /// Byte code the deck encodes this role with.
    pub fn code(self) -> u8 {
        ROLE_TABLE
            .iter()
            .find(|(_, role)| *role == self)
            .map(|(code, _)| *code)
            .unwrap_or(u8::MAX)
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role name {0:?}")]
pub struct UnknownRoleName(pub String);

impl FromStr for RoleId {
    type Err = UnknownRoleName;

    /// Accepts the canonical identifiers and the server's display spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wolf" | "werewolf" => Ok(RoleId::Wolf),
            "seer" => Ok(RoleId::Seer),
            "villager" => Ok(RoleId::Villager),
            _ => Err(UnknownRoleName(s.to_string())),
        }
    }
}

impl Serialize for RoleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RoleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The decrypted card did not name a known role.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnresolvedRole {
    #[error("role code {0:#04x} is not assigned")]
    UnknownCode(u8),
    #[error("decrypted element {0:?} is not a hexadecimal byte")]
    Unparsable(String),
}

/// Table-driven mapping from decrypted byte codes to roles.
pub struct RoleResolver;

impl RoleResolver {
    pub fn resolve(code: u8) -> Result<RoleId, UnresolvedRole> {
        ROLE_TABLE
            .iter()
            .find(|(candidate, _)| *candidate == code)
            .map(|(_, role)| *role)
            .ok_or(UnresolvedRole::UnknownCode(code))
    }

    /// Resolve the message element returned by the final decryption.
    pub fn resolve_element(element: &str) -> Result<RoleId, UnresolvedRole> {
        Self::resolve(parse_hex_byte(element)?)
    }
}

/// Parse a hexadecimal field element that must fit in one byte.
///
/// Accepts an optional `0x` prefix and any number of leading zero nibbles.
pub fn parse_hex_byte(element: &str) -> Result<u8, UnresolvedRole> {
    let unparsable = || UnresolvedRole::Unparsable(element.to_string());
    let trimmed = element.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        return Err(unparsable());
    }

    let padded = if digits.len() % 2 == 1 {
        format!("0{digits}")
    } else {
        digits.to_string()
    };
    let bytes = hex::decode(padded).map_err(|_| unparsable())?;
    match bytes.split_last() {
        Some((last, rest)) if rest.iter().all(|b| *b == 0) => Ok(*last),
        _ => Err(unparsable()),
    }
}
