//! Bridge from off-chain consensus to the on-chain multi-sig.
//!
//! Prepares typed payloads for signers, relays their signatures, and keeps
//! the stored proposal's mirror fields in step with observed chain state.
//! Relay failures never mutate proposal status; the chain only drives the
//! single `passed -> executed` hop, and only via `sync_proposal`.

use crate::chain::ops::{CallEncodeError, ContractCall};
use crate::chain::traits::{
    ChainClient, ChainError, MultiSigTransaction, SignedConfirmation, SignedSubmission, TxHash,
};
use crate::chain::typed_data::{TypedData, TypedDomain};
use crate::governance::types::{Proposal, ProposalStatus};
use crate::identity::Address;
use crate::store::{ChainMirror, ProposalStore, StoreError};
use crate::time::Clock;
use crate::timelock;
use std::sync::Arc;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Bridge errors.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("proposal {0} has not passed")]
    NotPassed(u64),

    #[error("proposal {0} not found")]
    NotFound(u64),

    #[error("proposal {0} has not been submitted on-chain")]
    NotSubmitted(u64),

    #[error("proposal target cannot be encoded: {0}")]
    InvalidTarget(#[from] CallEncodeError),

    /// Resolved by waiting; `remaining` is the seconds left on the gate.
    #[error("timelock active: {remaining}s remaining")]
    TimelockActive { remaining: u64 },

    /// Resolved by gathering more on-chain confirmations.
    #[error("quorum not met: {confirmations} of {threshold} confirmations")]
    QuorumNotMet { confirmations: u32, threshold: u32 },

    #[error("transaction already executed")]
    AlreadyExecuted,

    #[error("signer has not confirmed this transaction")]
    NotConfirmed,

    /// Transient transport/contract failure; the relay step may be retried.
    #[error("relay failed: {0}")]
    Relay(ChainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fold a chain verdict into the bridge taxonomy.
fn relay_err(e: ChainError) -> BridgeError {
    match e {
        ChainError::AlreadyExecuted => BridgeError::AlreadyExecuted,
        ChainError::NotConfirmed => BridgeError::NotConfirmed,
        other => BridgeError::Relay(other),
    }
}

pub struct OnChainBridge<P: ProposalStore, C: ChainClient> {
    store: Arc<P>,
    chain: Arc<C>,
    clock: Arc<dyn Clock>,
}

impl<P: ProposalStore, C: ChainClient> OnChainBridge<P, C> {
    pub fn new(store: Arc<P>, chain: Arc<C>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            chain,
            clock,
        }
    }

    /// Typed payload the proposer (or any signer) signs to queue a passed
    /// proposal on the multi-sig.
    pub async fn prepare_submission(&self, proposal: &Proposal) -> BridgeResult<TypedData> {
        if proposal.status != ProposalStatus::Passed {
            return Err(BridgeError::NotPassed(proposal.id));
        }
        let settings = self.chain.settings().await.map_err(relay_err)?;
        let call = ContractCall::from_proposal(proposal.kind, &proposal.target_id)?;
        Ok(TypedData::submission(
            TypedDomain::from_settings(&settings),
            &settings.verifying_contract,
            0,
            &call.encode(),
        ))
    }

    /// Relay a signed submission; records the assigned queue index on the
    /// proposal. Never touches proposal status.
    pub async fn relay_submission(
        &self,
        proposal_id: u64,
        signer: Address,
        signature: Vec<u8>,
    ) -> BridgeResult<u64> {
        let proposal = self
            .store
            .proposal(proposal_id)
            .await?
            .ok_or(BridgeError::NotFound(proposal_id))?;
        if proposal.status != ProposalStatus::Passed {
            return Err(BridgeError::NotPassed(proposal_id));
        }

        let settings = self.chain.settings().await.map_err(relay_err)?;
        let call = ContractCall::from_proposal(proposal.kind, &proposal.target_id)?;
        let tx_index = self
            .chain
            .submit_transaction(&SignedSubmission {
                to: settings.verifying_contract,
                value: 0,
                data: call.encode(),
                signer,
                signature,
            })
            .await
            .map_err(relay_err)?;

        self.store.set_on_chain_index(proposal_id, tx_index).await?;
        tracing::info!(proposal = proposal_id, tx_index, "proposal queued on-chain");
        Ok(tx_index)
    }

    /// Typed payload a signer signs to confirm the queued transaction.
    /// Binds the current signer-set version.
    pub async fn prepare_confirmation(
        &self,
        proposal: &Proposal,
        signer_version: u64,
    ) -> BridgeResult<TypedData> {
        let tx_index = proposal
            .on_chain_tx_index
            .ok_or(BridgeError::NotSubmitted(proposal.id))?;
        let settings = self.chain.settings().await.map_err(relay_err)?;
        Ok(TypedData::confirmation(
            TypedDomain::from_settings(&settings),
            tx_index,
            signer_version,
        ))
    }

    /// Relay a signed confirmation.
    pub async fn relay_confirmation(
        &self,
        tx_index: u64,
        signer_version: u64,
        signer: Address,
        signature: Vec<u8>,
    ) -> BridgeResult<()> {
        self.chain
            .confirm_transaction(&SignedConfirmation {
                tx_index,
                signer_version,
                signer,
                signature,
            })
            .await
            .map_err(relay_err)
    }

    /// Re-read one transaction from the chain. Pure refresh, no policy.
    pub async fn refresh_mirror(&self, tx_index: u64) -> BridgeResult<MultiSigTransaction> {
        self.chain.transaction(tx_index).await.map_err(relay_err)
    }

    /// Execute a queued transaction.
    ///
    /// Re-reads the mirror first: cached confirmation counts may lag, so
    /// quorum is always checked against fresh chain state. Timelock and
    /// quorum are verified here before relaying; the contract enforces them
    /// again on its side.
    pub async fn execute(&self, tx_index: u64) -> BridgeResult<TxHash> {
        let settings = self.chain.settings().await.map_err(relay_err)?;
        let tx = self.chain.transaction(tx_index).await.map_err(relay_err)?;

        if tx.executed {
            return Err(BridgeError::AlreadyExecuted);
        }
        let now = self.clock.now_unix();
        if timelock::is_locked(
            tx.submission_time,
            settings.timelock_delay_secs,
            now,
            tx.executed,
        ) {
            return Err(BridgeError::TimelockActive {
                remaining: timelock::remaining(tx.submission_time, settings.timelock_delay_secs, now),
            });
        }
        if tx.num_confirmations < settings.threshold {
            return Err(BridgeError::QuorumNotMet {
                confirmations: tx.num_confirmations,
                threshold: settings.threshold,
            });
        }

        let hash = self
            .chain
            .execute_transaction(tx_index)
            .await
            .map_err(relay_err)?;
        tracing::info!(tx_index, hash = %hash.0, "multi-sig transaction executed");
        Ok(hash)
    }

    /// Revoke a prior confirmation. Only valid before execution and only
    /// for a signer who confirmed.
    pub async fn revoke_confirmation(&self, tx_index: u64, signer: &Address) -> BridgeResult<()> {
        self.chain
            .revoke_confirmation(tx_index, signer)
            .await
            .map_err(relay_err)
    }

    /// Refresh a proposal's mirror fields from the chain and promote
    /// `passed -> executed` once execution is observed.
    pub async fn sync_proposal(&self, proposal_id: u64) -> BridgeResult<Proposal> {
        let proposal = self
            .store
            .proposal(proposal_id)
            .await?
            .ok_or(BridgeError::NotFound(proposal_id))?;
        let tx_index = proposal
            .on_chain_tx_index
            .ok_or(BridgeError::NotSubmitted(proposal_id))?;

        let tx = self.chain.transaction(tx_index).await.map_err(relay_err)?;
        self.store
            .update_chain_mirror(
                proposal_id,
                &ChainMirror {
                    submission_time: Some(tx.submission_time),
                    confirmations: tx.num_confirmations,
                    executed: tx.executed,
                },
            )
            .await?;

        if tx.executed {
            // Guarded transition; a no-op if already executed.
            self.store
                .transition_status(proposal_id, ProposalStatus::Passed, ProposalStatus::Executed)
                .await?;
        }

        self.store
            .proposal(proposal_id)
            .await?
            .ok_or(BridgeError::NotFound(proposal_id))
    }
}
