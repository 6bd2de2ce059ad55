//! On-chain multi-sig integration.
//!
//! The chain is consumed behind the `ChainClient` trait; local proposal
//! state mirrors observed chain state but never treats it as authoritative
//! for off-chain quorum.

pub mod bridge;
pub mod mock;
pub mod ops;
pub mod traits;
pub mod typed_data;

pub use bridge::{BridgeError, BridgeResult, OnChainBridge};
pub use mock::MockMultiSig;
pub use ops::{ContractCall, DecodedCall};
pub use traits::{
    ChainClient, ChainError, ChainResult, MultiSigTransaction, SignedConfirmation,
    SignedSubmission, SystemSettings, TxHash,
};
pub use typed_data::{TypedData, TypedDomain, PROTOCOL_DOMAIN_NAME};
