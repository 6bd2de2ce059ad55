//! Canonical vote message and Ed25519 signature verification.
//!
//! A vote signature covers a human-readable message binding the proposal id,
//! the decision, and the signing timestamp. Binding all three makes the
//! signature replay-proof: it cannot be re-presented for another proposal,
//! the opposite decision, or a later re-vote.

use crate::governance::types::Decision;
use crate::identity::Address;
use ring::signature::{UnparsedPublicKey, ED25519};
use thiserror::Error;

/// Fixed first line of every vote message.
pub const VOTE_MESSAGE_PREFIX: &str = "BBSNS Governance Vote";

/// Signature verification errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The signature does not verify against the given address.
    #[error("signature does not verify against the signer address")]
    Invalid,
}

/// Build the canonical message a voter signs.
///
/// Wire format (personal-message style, one field per line):
///
/// ```text
/// BBSNS Governance Vote
/// Proposal ID: 7
/// Decision: approve
/// Timestamp: 1722470400000
/// ```
pub fn canonical_vote_message(proposal_id: u64, decision: Decision, timestamp_ms: u64) -> String {
    format!(
        "{}\nProposal ID: {}\nDecision: {}\nTimestamp: {}",
        VOTE_MESSAGE_PREFIX, proposal_id, decision, timestamp_ms
    )
}

/// Verify an Ed25519 signature over arbitrary bytes against an address.
///
/// Used for vote messages (over the canonical UTF-8 message) and by the
/// in-process multi-sig for typed-data digests.
pub fn verify_signature(
    address: &Address,
    message: &[u8],
    signature: &[u8],
) -> Result<(), SignatureError> {
    UnparsedPublicKey::new(&ED25519, address.as_bytes())
        .verify(message, signature)
        .map_err(|_| SignatureError::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring::rand::SystemRandom;
    use ring::signature::{Ed25519KeyPair, KeyPair};

    fn test_keypair() -> (Ed25519KeyPair, Address) {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let keypair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        let address = Address::from_bytes(keypair.public_key().as_ref()).unwrap();
        (keypair, address)
    }

    #[test]
    fn canonical_message_shape() {
        let msg = canonical_vote_message(7, Decision::Approve, 1722470400000);
        assert_eq!(
            msg,
            "BBSNS Governance Vote\nProposal ID: 7\nDecision: approve\nTimestamp: 1722470400000"
        );
    }

    #[test]
    fn valid_signature_verifies() {
        let (keypair, address) = test_keypair();
        let msg = canonical_vote_message(3, Decision::Reject, 1000);
        let sig = keypair.sign(msg.as_bytes());
        assert!(verify_signature(&address, msg.as_bytes(), sig.as_ref()).is_ok());
    }

    #[test]
    fn tampered_message_fails() {
        let (keypair, address) = test_keypair();
        let msg = canonical_vote_message(3, Decision::Approve, 1000);
        let sig = keypair.sign(msg.as_bytes());

        // Same proposal, flipped decision: signature must not transfer.
        let other = canonical_vote_message(3, Decision::Reject, 1000);
        assert_eq!(
            verify_signature(&address, other.as_bytes(), sig.as_ref()),
            Err(SignatureError::Invalid)
        );
    }

    #[test]
    fn wrong_signer_fails() {
        let (keypair, _) = test_keypair();
        let (_, other_address) = test_keypair();
        let msg = canonical_vote_message(3, Decision::Approve, 1000);
        let sig = keypair.sign(msg.as_bytes());
        assert_eq!(
            verify_signature(&other_address, msg.as_bytes(), sig.as_ref()),
            Err(SignatureError::Invalid)
        );
    }
}
