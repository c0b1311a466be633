//! Local checks for night actions and votes, and the card-message proof
//! that backs a night action.

use std::sync::Arc;

use crate::deck::{DeckError, DeckState};
use crate::decryption::RevealedCard;
use crate::domain::{
    FieldElement, GamePhase, NightActionKind, RoleId, SecretKey, CIRCUIT_WIDTH, NEUTRAL_ELEMENT,
};
use crate::prover::VerifyCardMessageInput;
use crate::session::{CommandRejected, Session};

pub fn check_night_action(
    session: &Session,
    action: NightActionKind,
    target: &str,
) -> Result<(), CommandRejected> {
    if session.phase != GamePhase::Night {
        return Err(CommandRejected::NotNight {
            action,
            phase: session.phase,
        });
    }
    if session.is_me(target) {
        return Err(CommandRejected::SelfTarget);
    }
    let required = action.required_role();
    if session.my_role != Some(required) {
        return Err(CommandRejected::RoleNotAllowed {
            action,
            required,
            known: session.my_role,
        });
    }
    Ok(())
}

pub fn check_vote(session: &Session, target: &str) -> Result<(), CommandRejected> {
    if session.phase != GamePhase::Day {
        return Err(CommandRejected::NotDay(session.phase));
    }
    if session.is_me(target) {
        return Err(CommandRejected::SelfTarget);
    }
    Ok(())
}

/// Field element encoding of a role code, as returned by the final decryption.
pub fn role_message(role: RoleId) -> FieldElement {
    format!("0x{:02x}", role.code())
}

fn pad_elements(mut values: Vec<FieldElement>) -> Result<Vec<FieldElement>, DeckError> {
    if values.len() > CIRCUIT_WIDTH {
        return Err(DeckError::BadSize(values.len()));
    }
    values.resize(CIRCUIT_WIDTH, NEUTRAL_ELEMENT.to_string());
    Ok(values)
}

/// `verifyCardMessage` input proving the revealed card carries one of `allowed`.
pub fn card_message_input(
    deck: &DeckState,
    revealed: &RevealedCard,
    allowed: &[RoleId],
    secret: Arc<SecretKey>,
) -> Result<VerifyCardMessageInput, DeckError> {
    let expected: Vec<FieldElement> = allowed.iter().map(|role| role_message(*role)).collect();
    Ok(VerifyCardMessageInput {
        deck: deck.padded()?,
        deck_size: deck.len().to_string(),
        card: revealed.card.to_string(),
        num_decrypt_components: revealed.components.len().to_string(),
        decrypt_components: pad_elements(revealed.components.clone())?,
        num_expected_messages: expected.len().to_string(),
        expected_messages: pad_elements(expected)?,
        nullifier_secret: secret,
    })
}
