//! Typed structured-data payloads (EIP-712 equivalent).
//!
//! A signature over one of these payloads binds to a specific contract,
//! chain, and protocol version through the domain, and to a specific
//! operation through the typed message. The digest is what actually gets
//! signed: SHA-256 over a fixed prefix plus the hashes of the canonical
//! domain and message encodings.

use crate::identity::Address;
use crate::chain::traits::SystemSettings;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

/// Domain name shared by every payload this protocol signs.
pub const PROTOCOL_DOMAIN_NAME: &str = "BBSNS_Protocol";

/// Two-byte prefix keeping digests out of any other signing scheme's space.
const DIGEST_PREFIX: &[u8] = b"\x19\x01";

/// Signing domain: name, protocol version, chain, contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedDomain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: String,
}

impl TypedDomain {
    pub fn from_settings(settings: &SystemSettings) -> Self {
        Self {
            name: PROTOCOL_DOMAIN_NAME.to_string(),
            version: settings.domain_version.clone(),
            chain_id: settings.chain_id,
            verifying_contract: settings.verifying_contract.to_hex(),
        }
    }
}

/// A complete payload handed to a signer: domain, type descriptions, and
/// the message itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedData {
    pub domain: TypedDomain,
    pub primary_type: String,
    pub types: serde_json::Value,
    pub message: serde_json::Value,
}

impl TypedData {
    /// Payload queueing a new multi-sig transaction.
    pub fn submission(domain: TypedDomain, to: &Address, value: u64, data: &[u8]) -> Self {
        Self {
            domain,
            primary_type: "Submission".to_string(),
            types: json!({
                "Submission": [
                    {"name": "to", "type": "address"},
                    {"name": "value", "type": "uint64"},
                    {"name": "data", "type": "bytes"},
                ]
            }),
            message: json!({
                "to": to.to_hex(),
                "value": value,
                "data": hex::encode(data),
            }),
        }
    }

    /// Payload confirming a queued transaction. `signer_version` is bound
    /// into the message so a signer-set change invalidates old signatures.
    pub fn confirmation(domain: TypedDomain, tx_index: u64, signer_version: u64) -> Self {
        Self {
            domain,
            primary_type: "Confirmation".to_string(),
            types: json!({
                "Confirmation": [
                    {"name": "txIndex", "type": "uint64"},
                    {"name": "version", "type": "uint64"},
                ]
            }),
            message: json!({
                "txIndex": tx_index,
                "version": signer_version,
            }),
        }
    }

    /// The 32 bytes a signer actually signs.
    ///
    /// `serde_json` serializes maps with sorted keys, so both inner hashes
    /// are over canonical bytes.
    pub fn digest(&self) -> [u8; 32] {
        let domain_bytes = serde_json::to_vec(&self.domain).unwrap_or_default();
        let message_bytes = serde_json::to_vec(&self.message).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(DIGEST_PREFIX);
        hasher.update(Sha256::digest(&domain_bytes));
        hasher.update(self.primary_type.as_bytes());
        hasher.update(Sha256::digest(&message_bytes));
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> TypedDomain {
        TypedDomain {
            name: PROTOCOL_DOMAIN_NAME.to_string(),
            version: "1".to_string(),
            chain_id: 1337,
            verifying_contract: Address::from_bytes(&[9u8; 32]).unwrap().to_hex(),
        }
    }

    #[test]
    fn digest_is_stable() {
        let a = TypedData::confirmation(domain(), 4, 2);
        let b = TypedData::confirmation(domain(), 4, 2);
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn digest_binds_message_fields() {
        let base = TypedData::confirmation(domain(), 4, 2);
        assert_ne!(base.digest(), TypedData::confirmation(domain(), 5, 2).digest());
        assert_ne!(base.digest(), TypedData::confirmation(domain(), 4, 3).digest());
    }

    #[test]
    fn digest_binds_domain() {
        let base = TypedData::confirmation(domain(), 4, 2);
        let mut other_domain = domain();
        other_domain.chain_id = 1;
        assert_ne!(
            base.digest(),
            TypedData::confirmation(other_domain, 4, 2).digest()
        );
    }

    #[test]
    fn submission_and_confirmation_never_collide() {
        // Same domain, disjoint primary types and messages.
        let to = Address::from_bytes(&[3u8; 32]).unwrap();
        let submission = TypedData::submission(domain(), &to, 0, &[1, 2, 3]);
        let confirmation = TypedData::confirmation(domain(), 0, 0);
        assert_ne!(submission.digest(), confirmation.digest());
    }
}
