//! One player's re-encrypt-and-permute step of the collaborative shuffle.
//!
//! Split as a pure [`ShuffleCoordinator::prepare`] (consumes randomness, no
//! I/O) and an async [`ShuffleCoordinator::execute`] that talks to the
//! proving service, so the dispatcher can keep its RNG on the event loop and
//! run the proof on a spawned task.

use rand::Rng;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::deck::{pad_deck, DeckError};
use crate::domain::{Deck, EncryptedCard, FieldElement, CIRCUIT_WIDTH, NEUTRAL_ELEMENT};
use crate::prover::{
    Circuit, CircuitRequest, ProofMode, ProverClient, ProverError, ShuffleInput, ShuffleOutputs,
};

mod permutation;

pub use permutation::{is_permutation, PermutationMatrix};

const LOG_TARGET: &str = "werewolf::shuffler";

#[derive(Debug, thiserror::Error)]
pub enum ShuffleError {
    #[error("cannot shuffle deck: {0}")]
    Deck(#[from] DeckError),
    #[error("shuffle proof failed: {0}")]
    Prover(#[from] ProverError),
    #[error("shuffled deck has {got} rows, expected at least {expected}")]
    ShortOutput { expected: usize, got: usize },
}

/// Everything needed to run one `shuffle4` call.
#[derive(Debug, Clone)]
pub struct ShufflePlan {
    input: ShuffleInput,
    real_rows: usize,
}

impl ShufflePlan {
    pub fn input(&self) -> &ShuffleInput {
        &self.input
    }

    pub fn real_rows(&self) -> usize {
        self.real_rows
    }
}

/// New deck plus the artefacts for `shuffleDone`.
#[derive(Debug, Clone, PartialEq)]
pub struct ShuffleOutcome {
    pub deck: Deck,
    pub proof: Value,
    pub public_inputs: Value,
}

pub struct ShuffleCoordinator;

impl ShuffleCoordinator {
    pub fn prepare<R: Rng + ?Sized>(
        rng: &mut R,
        generator: &str,
        aggregate_public_key: &str,
        deck: &[EncryptedCard],
    ) -> Result<ShufflePlan, ShuffleError> {
        let padded = pad_deck(deck)?;
        let real_rows = deck.len();

        let rand: Vec<FieldElement> = (0..CIRCUIT_WIDTH)
            .map(|row| {
                if row < real_rows {
                    rng.gen::<u64>().to_string()
                } else {
                    NEUTRAL_ELEMENT.to_string()
                }
            })
            .collect();
        let perm = PermutationMatrix::random(real_rows, rng).to_rows(CIRCUIT_WIDTH);

        Ok(ShufflePlan {
            input: ShuffleInput {
                g: generator.to_string(),
                agg_pk: aggregate_public_key.to_string(),
                deck: padded,
                rand,
                perm,
            },
            real_rows,
        })
    }

    pub async fn execute<P>(prover: &P, plan: ShufflePlan) -> Result<ShuffleOutcome, ShuffleError>
    where
        P: ProverClient + ?Sized,
    {
        let real_rows = plan.real_rows;
        let request = CircuitRequest::new(&plan.input)?;
        debug!(target = LOG_TARGET, rows = real_rows, "submitting shuffle proof");

        let output = match prover.call(ProofMode::Prove, request).await {
            Ok(output) => output,
            Err(err) => {
                warn!(target = LOG_TARGET, error = %err, "shuffle proof call failed");
                return Err(err.into());
            }
        };
        let parsed: ShuffleOutputs = output.parse_outputs(ShuffleInput::NAME)?;
        if parsed.shuffled_deck.len() < real_rows {
            return Err(ShuffleError::ShortOutput {
                expected: real_rows,
                got: parsed.shuffled_deck.len(),
            });
        }

        let mut deck = parsed.shuffled_deck;
        deck.truncate(real_rows);
        info!(target = LOG_TARGET, rows = real_rows, "shuffle step proven");
        Ok(ShuffleOutcome {
            deck,
            proof: output.proof,
            public_inputs: output.public_inputs,
        })
    }
}
