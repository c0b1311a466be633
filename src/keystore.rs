//! Per-session ElGamal keypair.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info};

use crate::domain::{FieldElement, KeyPair, SecretKey};
use crate::prover::{
    Circuit, CircuitRequest, GenKeyPairInput, KeyPairOutputs, ProofMode, ProverClient, ProverError,
};

const LOG_TARGET: &str = "werewolf::keystore";

#[derive(Debug, thiserror::Error)]
pub enum KeyGenError {
    #[error("key generation failed: {0}")]
    Prover(#[from] ProverError),
    #[error("key generation returned an empty {0}")]
    EmptyKey(&'static str),
}

/// Holds the session keypair. The secret is shared by `Arc` with proof tasks
/// and never leaves the process except inside a circuit input.
#[derive(Debug, Clone)]
pub struct KeyStore {
    public_key: FieldElement,
    secret: Arc<SecretKey>,
}

impl KeyStore {
    /// Fresh seed `r` for `genElgamalKeyPair`.
    pub fn fresh_seed<R: Rng + ?Sized>(rng: &mut R) -> FieldElement {
        rng.gen::<u128>().to_string()
    }

    /// Run `genElgamalKeyPair{g, r}` on the execution endpoint.
    pub async fn generate<P>(prover: &P, generator: &str, seed: FieldElement) -> Result<Self, KeyGenError>
    where
        P: ProverClient + ?Sized,
    {
        let input = GenKeyPairInput {
            g: generator.to_string(),
            r: seed,
        };
        let request = CircuitRequest::new(&input)?;
        debug!(target = LOG_TARGET, "requesting session keypair");

        let output = prover.call(ProofMode::Execute, request).await?;
        let keys: KeyPairOutputs = output.parse_outputs(GenKeyPairInput::NAME)?;
        Self::from_pair(KeyPair {
            public_key: keys.pk,
            secret_key: SecretKey::new(keys.sk),
        })
    }

    pub fn from_pair(pair: KeyPair) -> Result<Self, KeyGenError> {
        if pair.public_key.trim().is_empty() {
            return Err(KeyGenError::EmptyKey("public key"));
        }
        if pair.secret_key.expose().trim().is_empty() {
            return Err(KeyGenError::EmptyKey("secret key"));
        }
        info!(target = LOG_TARGET, public_key = %pair.public_key, "session keypair ready");
        Ok(Self {
            public_key: pair.public_key,
            secret: Arc::new(pair.secret_key),
        })
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Secret key handle for building decryption and nullifier inputs.
    pub fn secret(&self) -> Arc<SecretKey> {
        Arc::clone(&self.secret)
    }
}
