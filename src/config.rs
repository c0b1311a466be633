use std::time::Duration;

use url::Url;

/// Generator used by every ElGamal circuit unless configured otherwise.
pub const DEFAULT_GENERATOR: &str = "3";

/// How the player's preferred card index is chosen once the deck opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardPreference {
    /// Pick a uniformly random index as soon as the deck is open.
    Random,
    /// Wait for a `PickCard` command.
    Manual,
}

#[derive(Debug, Clone)]
pub struct ProverConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
}

impl ProverConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            request_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Knobs for the protocol dispatcher. Independent of any socket or HTTP endpoint.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub player_name: String,
    pub generator: String,
    pub card_preference: CardPreference,
    pub prove_night_actions: bool,
    pub completion_capacity: usize,
    pub event_capacity: usize,
    pub rng_seed: Option<[u8; 32]>,
}

impl DispatcherConfig {
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            generator: DEFAULT_GENERATOR.to_string(),
            card_preference: CardPreference::Random,
            prove_night_actions: true,
            completion_capacity: 64,
            event_capacity: 256,
            rng_seed: None,
        }
    }

    pub fn with_card_preference(mut self, preference: CardPreference) -> Self {
        self.card_preference = preference;
        self
    }

    pub fn with_rng_seed(mut self, seed: [u8; 32]) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn with_night_action_proofs(mut self, enabled: bool) -> Self {
        self.prove_night_actions = enabled;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: Url,
    pub handshake_timeout: Duration,
    pub frame_capacity: usize,
    pub prover: ProverConfig,
    pub dispatcher: DispatcherConfig,
}

/// Expand a 64-bit seed into the 32-byte form `StdRng` expects.
pub fn seed_to_array(seed: u64) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&seed.to_le_bytes());
    bytes
}
