//! Threshold decryption of reserved cards.
//!
//! Every player removes one ElGamal layer from every other player's card
//! (helper flow) and finally removes its own layer from its own card (owner
//! flow). The owner keeps per-card bookkeeping in [`PendingDecryptions`].

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{
    CardIndex, DecryptComponent, EncryptedCard, FieldElement, PlayerId, RoleId,
    RoleResolver, SecretKey, UnresolvedRole,
};
use crate::prover::{
    Circuit, CircuitRequest, DecryptOneLayerInput, DecryptOutputs, ProofMode, ProverClient,
    ProverError,
};

mod pending;

pub use pending::{PendingDecryption, PendingDecryptions};

const LOG_TARGET: &str = "werewolf::decryption";

#[derive(Debug, thiserror::Error)]
pub enum DecryptError {
    #[error("decryption proof failed: {0}")]
    Prover(#[from] ProverError),
    #[error("no pending decryption for card {0}")]
    NothingPending(CardIndex),
}

/// `needDecrypt{for, card, cipher}` from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperRequest {
    pub requester: PlayerId,
    pub card: CardIndex,
    pub cipher: EncryptedCard,
}

/// This player's layer removed from someone else's card, ready for `decryptCard`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperShare {
    pub requester: PlayerId,
    pub card: CardIndex,
    pub partial: EncryptedCard,
    pub component: DecryptComponent,
}

/// Own card after the last layer is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealedCard {
    pub card: CardIndex,
    /// Helper components in arrival order followed by the owner's own.
    pub components: Vec<DecryptComponent>,
    pub message: FieldElement,
}

impl RevealedCard {
    pub fn role(&self) -> Result<RoleId, UnresolvedRole> {
        RoleResolver::resolve_element(&self.message)
    }
}

#[derive(Debug, Default)]
pub struct DecryptionOrchestrator {
    pending: PendingDecryptions,
    helping: HashSet<(PlayerId, CardIndex)>,
}

impl DecryptionOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &PendingDecryptions {
        &self.pending
    }

    pub fn helping_count(&self) -> usize {
        self.helping.len()
    }

    /// Returns `false` when the same request is already being served.
    pub fn begin_help(&mut self, request: &HelperRequest) -> bool {
        let fresh = self
            .helping
            .insert((request.requester.clone(), request.card));
        if !fresh {
            debug!(
                target = LOG_TARGET,
                requester = %request.requester,
                card = request.card,
                "duplicate decrypt request ignored"
            );
        }
        fresh
    }

    pub fn finish_help(&mut self, requester: &str, card: CardIndex) {
        self.helping.remove(&(requester.to_string(), card));
    }

    /// Open the owner entry. `me` is `None` until the lobby has named us.
    pub fn on_reserved(&mut self, card: CardIndex, cipher: EncryptedCard, me: Option<PlayerId>) {
        self.pending.open(card, cipher, me);
    }

    pub fn on_partial_ready(
        &mut self,
        card: CardIndex,
        partial: EncryptedCard,
        component: DecryptComponent,
    ) -> usize {
        let count = self.pending.record_partial(card, partial, component);
        debug!(target = LOG_TARGET, card, components = count, "partial decryption recorded");
        count
    }

    /// Remove the entry for the final decrypt.
    pub fn take_for_final(&mut self, card: CardIndex) -> Result<PendingDecryption, DecryptError> {
        self.pending
            .take(card)
            .ok_or(DecryptError::NothingPending(card))
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.helping.clear();
    }

    /// Remove this player's layer from another player's card, with a proof.
    pub async fn help<P>(
        prover: &P,
        generator: &str,
        secret: Arc<SecretKey>,
        request: HelperRequest,
    ) -> Result<HelperShare, DecryptError>
    where
        P: ProverClient + ?Sized,
    {
        let outputs = decrypt_one_layer(
            prover,
            ProofMode::Prove,
            generator,
            secret,
            request.cipher.clone(),
        )
        .await
        .map_err(|err| {
            warn!(
                target = LOG_TARGET,
                requester = %request.requester,
                card = request.card,
                error = %err,
                "helper decryption failed"
            );
            err
        })?;

        let DecryptOutputs(component, remaining) = outputs;
        Ok(HelperShare {
            partial: EncryptedCard::new(request.cipher.c1(), remaining),
            component,
            requester: request.requester,
            card: request.card,
        })
    }

    /// Remove the last layer from this player's own card.
    pub async fn finalize<P>(
        prover: &P,
        generator: &str,
        secret: Arc<SecretKey>,
        pending: PendingDecryption,
    ) -> Result<RevealedCard, DecryptError>
    where
        P: ProverClient + ?Sized,
    {
        let PendingDecryption {
            card,
            cipher,
            mut components,
            ..
        } = pending;
        let DecryptOutputs(own_component, message) =
            decrypt_one_layer(prover, ProofMode::Execute, generator, secret, cipher).await?;

        components.push(own_component);
        info!(target = LOG_TARGET, card, layers = components.len(), "own card decrypted");
        Ok(RevealedCard {
            card,
            components,
            message,
        })
    }
}

async fn decrypt_one_layer<P>(
    prover: &P,
    mode: ProofMode,
    generator: &str,
    secret: Arc<SecretKey>,
    card: EncryptedCard,
) -> Result<DecryptOutputs, ProverError>
where
    P: ProverClient + ?Sized,
{
    let input = DecryptOneLayerInput {
        g: generator.to_string(),
        card,
        sk: secret,
    };
    let request = CircuitRequest::new(&input)?;
    let output = prover.call(mode, request).await?;
    output.parse_outputs(DecryptOneLayerInput::NAME)
}
