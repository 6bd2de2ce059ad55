//! Typed codec for multi-sig call data.
//!
//! Each governance action maps to one contract method. Call data is a
//! 4-byte method selector followed by a CBOR-encoded argument; decoding is
//! an explicit tagged union with an `Unknown` fallback, so a transaction
//! queued by other tooling still mirrors cleanly instead of being
//! best-effort string-matched.

use crate::governance::types::ProposalKind;
use crate::identity::Address;
use crate::serialization::{from_cbor, to_cbor};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Call encoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallEncodeError {
    #[error("invalid call target: {0}")]
    InvalidTarget(String),
}

/// A decoded contract method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    AddSigner { signer: Address },
    RemoveSigner { signer: Address },
    ChangeThreshold { threshold: u32 },
    BanAccount { account: String },
    UnbanAccount { account: String },
    SystemUpgrade { artifact: String },
    Custom { note: String },
}

/// Decode result: a known method or an explicit unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedCall {
    Known(ContractCall),
    /// Selector did not match any known method (or the data was malformed).
    Unknown { selector: [u8; 4] },
}

impl ContractCall {
    /// Contract method signature string (selector preimage).
    pub fn method(&self) -> &'static str {
        match self {
            ContractCall::AddSigner { .. } => "addSigner(address)",
            ContractCall::RemoveSigner { .. } => "removeSigner(address)",
            ContractCall::ChangeThreshold { .. } => "changeThreshold(uint32)",
            ContractCall::BanAccount { .. } => "banAccount(string)",
            ContractCall::UnbanAccount { .. } => "unbanAccount(string)",
            ContractCall::SystemUpgrade { .. } => "systemUpgrade(string)",
            ContractCall::Custom { .. } => "custom(string)",
        }
    }

    /// Build the call a proposal authorizes from its kind and target.
    pub fn from_proposal(kind: ProposalKind, target_id: &str) -> Result<Self, CallEncodeError> {
        match kind {
            ProposalKind::AddSigner => {
                let signer = Address::from_hex(target_id).ok_or_else(|| {
                    CallEncodeError::InvalidTarget(format!("'{}' is not an address", target_id))
                })?;
                Ok(ContractCall::AddSigner { signer })
            }
            ProposalKind::RemoveSigner => {
                let signer = Address::from_hex(target_id).ok_or_else(|| {
                    CallEncodeError::InvalidTarget(format!("'{}' is not an address", target_id))
                })?;
                Ok(ContractCall::RemoveSigner { signer })
            }
            ProposalKind::ChangeThreshold => {
                let threshold = target_id.parse::<u32>().map_err(|_| {
                    CallEncodeError::InvalidTarget(format!("'{}' is not an integer", target_id))
                })?;
                Ok(ContractCall::ChangeThreshold { threshold })
            }
            ProposalKind::BanAccount => Ok(ContractCall::BanAccount {
                account: target_id.to_string(),
            }),
            ProposalKind::UnbanAccount => Ok(ContractCall::UnbanAccount {
                account: target_id.to_string(),
            }),
            ProposalKind::SystemUpgrade => Ok(ContractCall::SystemUpgrade {
                artifact: target_id.to_string(),
            }),
            ProposalKind::Custom => Ok(ContractCall::Custom {
                note: target_id.to_string(),
            }),
        }
    }

    /// Encode to call data: selector || CBOR(argument).
    pub fn encode(&self) -> Vec<u8> {
        let arg = match self {
            ContractCall::AddSigner { signer } | ContractCall::RemoveSigner { signer } => {
                to_cbor(&signer.to_hex())
            }
            ContractCall::ChangeThreshold { threshold } => to_cbor(threshold),
            ContractCall::BanAccount { account } | ContractCall::UnbanAccount { account } => {
                to_cbor(account)
            }
            ContractCall::SystemUpgrade { artifact } => to_cbor(artifact),
            ContractCall::Custom { note } => to_cbor(note),
        }
        // Encoding these argument types to a Vec cannot fail.
        .unwrap_or_default();

        let mut data = selector(self.method()).to_vec();
        data.extend_from_slice(&arg);
        data
    }

    /// Decode call data. Never errors: anything unrecognized or malformed
    /// is an `Unknown` with the observed selector.
    pub fn decode(data: &[u8]) -> DecodedCall {
        if data.len() < 4 {
            return DecodedCall::Unknown { selector: [0u8; 4] };
        }
        let mut sel = [0u8; 4];
        sel.copy_from_slice(&data[..4]);
        let body = &data[4..];

        let call = if sel == selector("addSigner(address)") {
            decode_address(body).map(|signer| ContractCall::AddSigner { signer })
        } else if sel == selector("removeSigner(address)") {
            decode_address(body).map(|signer| ContractCall::RemoveSigner { signer })
        } else if sel == selector("changeThreshold(uint32)") {
            from_cbor::<u32>(body)
                .ok()
                .map(|threshold| ContractCall::ChangeThreshold { threshold })
        } else if sel == selector("banAccount(string)") {
            from_cbor::<String>(body)
                .ok()
                .map(|account| ContractCall::BanAccount { account })
        } else if sel == selector("unbanAccount(string)") {
            from_cbor::<String>(body)
                .ok()
                .map(|account| ContractCall::UnbanAccount { account })
        } else if sel == selector("systemUpgrade(string)") {
            from_cbor::<String>(body)
                .ok()
                .map(|artifact| ContractCall::SystemUpgrade { artifact })
        } else if sel == selector("custom(string)") {
            from_cbor::<String>(body)
                .ok()
                .map(|note| ContractCall::Custom { note })
        } else {
            None
        };

        match call {
            Some(call) => DecodedCall::Known(call),
            None => DecodedCall::Unknown { selector: sel },
        }
    }
}

fn decode_address(body: &[u8]) -> Option<Address> {
    from_cbor::<String>(body)
        .ok()
        .and_then(|hex| Address::from_hex(&hex))
}

/// First 4 bytes of SHA-256 over the method signature string.
fn selector(method: &str) -> [u8; 4] {
    let digest = Sha256::digest(method.as_bytes());
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&digest[..4]);
    sel
}
