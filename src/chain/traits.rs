//! Chain client abstraction.
//!
//! Covers exactly the multi-sig contract surface this protocol consumes:
//! read settings, submit, confirm, revoke, execute, and read queued
//! transactions. A mock implementation backs the tests; a production
//! deployment implements this trait over its RPC client.

use crate::identity::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Chain-side failures.
///
/// `Transport` is the only transient variant; everything else is a contract
/// verdict and retrying without new input will not change it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("chain transport error: {0}")]
    Transport(String),

    #[error("contract rejected the call: {0}")]
    Contract(String),

    #[error("unknown transaction index {0}")]
    UnknownTransaction(u64),

    #[error("signature bound to signer-set version {got}, current is {current}")]
    StaleSignerVersion { got: u64, current: u64 },

    #[error("signature rejected by the contract")]
    BadSignature,

    #[error("address is not in the signer set")]
    NotASigner,

    #[error("signer already confirmed this transaction")]
    AlreadyConfirmed,

    #[error("signer has not confirmed this transaction")]
    NotConfirmed,

    #[error("transaction already executed")]
    AlreadyExecuted,

    #[error("confirmations below threshold")]
    InsufficientConfirmations,

    #[error("timelock has not elapsed")]
    TimelockActive,
}

/// Contract settings; authoritative for quorum and timelock of *new* work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSettings {
    pub threshold: u32,
    pub signers: Vec<Address>,
    pub timelock_delay_secs: u64,
    /// Monotonic counter bumped on every signer-set change; confirmation
    /// signatures bind to it so stale ones die with the old set.
    pub signer_version: u64,
    pub chain_id: u64,
    pub verifying_contract: Address,
    pub domain_version: String,
}

/// Queued multi-sig transaction as observed on chain (read-only mirror).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSigTransaction {
    pub index: u64,
    pub to: Address,
    pub value: u64,
    pub data: Vec<u8>,
    pub submission_time: u64,
    pub num_confirmations: u32,
    pub executed: bool,
    /// Addresses that have confirmed and not revoked.
    pub confirmations: Vec<Address>,
}

/// Transaction hash returned by a relayed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHash(pub String);

/// Signed payload queueing a new transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSubmission {
    pub to: Address,
    pub value: u64,
    pub data: Vec<u8>,
    pub signer: Address,
    pub signature: Vec<u8>,
}

/// Signed payload confirming a queued transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedConfirmation {
    pub tx_index: u64,
    pub signer_version: u64,
    pub signer: Address,
    pub signature: Vec<u8>,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn settings(&self) -> ChainResult<SystemSettings>;

    /// Queue a transaction; returns its index.
    async fn submit_transaction(&self, submission: &SignedSubmission) -> ChainResult<u64>;

    async fn confirm_transaction(&self, confirmation: &SignedConfirmation) -> ChainResult<()>;

    async fn revoke_confirmation(&self, tx_index: u64, signer: &Address) -> ChainResult<()>;

    async fn execute_transaction(&self, tx_index: u64) -> ChainResult<TxHash>;

    async fn transaction(&self, tx_index: u64) -> ChainResult<MultiSigTransaction>;

    async fn transactions(&self) -> ChainResult<Vec<MultiSigTransaction>>;
}
