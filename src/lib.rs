pub mod actions;
pub mod config;
pub mod deck;
pub mod decryption;
pub mod dispatcher;
pub mod domain;
pub mod keystore;
pub mod messages;
pub mod prover;
pub mod reservation;
pub mod session;
pub mod shuffler;
pub mod tokio_tools;
pub mod transport;

#[cfg(test)]
pub mod test_utils;

pub use config::{CardPreference, ClientConfig, DispatcherConfig, ProverConfig};
pub use dispatcher::{DispatcherChannels, ProtocolDispatcher};
pub use domain::{RoleId, RoleResolver};
pub use session::{GameEvent, PlayerCommand, ProtocolError};
