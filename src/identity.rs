//! Signer identity types.
//!
//! A signer is known two ways: by a stable account identifier (`SignerId`)
//! used in the off-chain store, and by an `Address` (hex-encoded 32-byte
//! Ed25519 public key) used to verify signatures and to match the on-chain
//! signer set. The two are bound together by a `SignerRecord` looked up from
//! the signer directory.

use crate::governance::types::ParticipationScope;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Off-chain account identifier of a signer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SignerId(pub String);

impl fmt::Display for SignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// On-record signing address (32-byte Ed25519 public key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address([u8; 32]);

impl Address {
    /// Create from raw bytes. Returns `None` unless exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 32 {
            return None;
        }
        let mut buf = [0u8; 32];
        buf.copy_from_slice(bytes);
        Some(Self(buf))
    }

    /// Parse from a hex string (64 hex chars, optional `0x` prefix).
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        hex::decode(s).ok().and_then(|b| Self::from_bytes(&b))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Directory entry binding an account to its signing address and roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerRecord {
    pub id: SignerId,
    pub address: Address,
    pub admin: bool,
    pub notary: bool,
}

impl SignerRecord {
    /// Whether this signer may vote on proposals open to `scope`.
    pub fn in_scope(&self, scope: ParticipationScope) -> bool {
        match scope {
            ParticipationScope::Admin => self.admin,
            ParticipationScope::Notary => self.notary,
            ParticipationScope::All => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_hex_roundtrip() {
        let addr = Address::from_bytes(&[7u8; 32]).unwrap();
        let parsed = Address::from_hex(&addr.to_hex()).unwrap();
        assert_eq!(addr, parsed);
    }

    #[test]
    fn address_accepts_0x_prefix() {
        let addr = Address::from_bytes(&[1u8; 32]).unwrap();
        let prefixed = format!("0x{}", addr.to_hex());
        assert_eq!(Address::from_hex(&prefixed), Some(addr));
    }

    #[test]
    fn address_rejects_wrong_length() {
        assert!(Address::from_bytes(&[0u8; 31]).is_none());
        assert!(Address::from_hex("abcd").is_none());
    }

    #[test]
    fn scope_membership() {
        let record = SignerRecord {
            id: SignerId("alice".to_string()),
            address: Address::from_bytes(&[2u8; 32]).unwrap(),
            admin: true,
            notary: false,
        };
        assert!(record.in_scope(ParticipationScope::Admin));
        assert!(!record.in_scope(ParticipationScope::Notary));
        assert!(record.in_scope(ParticipationScope::All));
    }
}
